// State management module
//
// Wraps BuildState in Arc<RwLock<T>> and broadcasts change events so the CLI
// (or any other listener) can follow a build without polling.

use camino::Utf8PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Pipeline phase of the current build
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildPhase {
    #[default]
    Idle,
    Cleaning,
    Traversing,
    WritingConfig,
    CompilingLocales,
    CopyingRuntime,
    Complete,
    Failed,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Idle => "idle",
            BuildPhase::Cleaning => "cleaning",
            BuildPhase::Traversing => "traversing",
            BuildPhase::WritingConfig => "writing config",
            BuildPhase::CompilingLocales => "compiling locales",
            BuildPhase::CopyingRuntime => "copying runtime",
            BuildPhase::Complete => "complete",
            BuildPhase::Failed => "failed",
        }
    }
}

/// Observable state of one build
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildState {
    pub phase: BuildPhase,
    pub build_id: Option<String>,
    pub files_processed: usize,
    pub modules_registered: usize,
    pub locales_compiled: Vec<String>,
    pub config_path: Option<Utf8PathBuf>,
    pub error: Option<String>,
}

impl BuildState {
    pub fn is_running(&self) -> bool {
        !matches!(
            self.phase,
            BuildPhase::Idle | BuildPhase::Complete | BuildPhase::Failed
        )
    }
}

/// Change events emitted when state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    PhaseChanged { phase: BuildPhase },

    /// The build traversal reached barrier-zero
    TraversalComplete { files: usize },

    ConfigWritten { path: Utf8PathBuf },

    LocaleCompiled { locale: String },

    /// Fired once per successful build
    BuildComplete { build_id: String },

    BuildFailed { message: String },
}

/// Thread-safe build state with event emission
///
/// - [`read()`](Self::read) / [`snapshot()`](Self::snapshot) for access
/// - [`update()`](Self::update) for mutations, which emits the detected changes
/// - [`subscribe()`](Self::subscribe) for listening
#[derive(Debug)]
pub struct StateManager {
    state: Arc<RwLock<BuildState>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Broadcast channel buffers 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(BuildState::default())),
            state_tx,
        }
    }

    pub fn snapshot(&self) -> BuildState {
        self.read_lock().clone()
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&BuildState) -> R,
    {
        f(&self.read_lock())
    }

    /// Apply `update_fn`, then emit and return every detected change
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut BuildState),
    {
        let mut state = self.write_lock();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = detect_changes(&old_state, &state);
        for change in &changes {
            // No subscribers is fine
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    pub fn start_build(&self, build_id: &str) -> Vec<StateChange> {
        self.update(|state| {
            *state = BuildState {
                phase: BuildPhase::Cleaning,
                build_id: Some(build_id.to_string()),
                ..BuildState::default()
            };
        })
    }

    pub fn set_phase(&self, phase: BuildPhase) -> Vec<StateChange> {
        self.update(|state| state.phase = phase)
    }

    pub fn record_traversal(&self, files: usize) -> Vec<StateChange> {
        self.update(|state| state.files_processed = files)
    }

    pub fn record_config(&self, path: Utf8PathBuf, modules: usize) -> Vec<StateChange> {
        self.update(|state| {
            state.config_path = Some(path);
            state.modules_registered = modules;
        })
    }

    pub fn record_locale(&self, locale: &str) -> Vec<StateChange> {
        self.update(|state| state.locales_compiled.push(locale.to_string()))
    }

    pub fn complete_build(&self) -> Vec<StateChange> {
        self.update(|state| state.phase = BuildPhase::Complete)
    }

    pub fn fail_build(&self, message: impl Into<String>) -> Vec<StateChange> {
        let message = message.into();
        self.update(|state| {
            state.phase = BuildPhase::Failed;
            state.error = Some(message);
        })
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, BuildState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, BuildState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_changes(old: &BuildState, new: &BuildState) -> Vec<StateChange> {
    let mut changes = Vec::new();

    if old.phase != new.phase {
        changes.push(StateChange::PhaseChanged { phase: new.phase });
    }

    if old.files_processed != new.files_processed {
        changes.push(StateChange::TraversalComplete {
            files: new.files_processed,
        });
    }

    if old.config_path != new.config_path {
        if let Some(path) = &new.config_path {
            changes.push(StateChange::ConfigWritten { path: path.clone() });
        }
    }

    // Locales are only ever appended
    if new.locales_compiled.len() > old.locales_compiled.len() {
        for locale in &new.locales_compiled[old.locales_compiled.len()..] {
            changes.push(StateChange::LocaleCompiled {
                locale: locale.clone(),
            });
        }
    }

    if old.phase != new.phase {
        match new.phase {
            BuildPhase::Complete => changes.push(StateChange::BuildComplete {
                build_id: new.build_id.clone().unwrap_or_default(),
            }),
            BuildPhase::Failed => changes.push(StateChange::BuildFailed {
                message: new.error.clone().unwrap_or_default(),
            }),
            _ => {}
        }
    }

    changes
}
