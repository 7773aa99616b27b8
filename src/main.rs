//! modforge - build pipeline entry point.
//!
//! # Commands
//!
//! - `modforge build [--type dev|test|prod]`: clean earlier builds, compile the
//!   project into `<build_dir>/<timestamp>/`, write the loader document,
//!   compile locales and copy the runtime bootstrap files
//! - `modforge config`: regenerate the development loader document in the
//!   project's own config directory, without building
//!
//! # Execution
//!
//! 1. Load `modforge.yaml` (optional) from the project root
//! 2. Initialize logging: `<log_dir>/modforge.<date>` plus console output
//! 3. Create a current-thread tokio runtime; traversal branches interleave on
//!    it but never run in parallel
//! 4. Load the application and core descriptors (fatal when missing)
//! 5. Run the command, reporting state changes as they happen

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use modforge::state::BuildPhase;
use modforge::{
    APP_NAME, BuildContext, BuildVariant, Builder, ConfigManager, StateChange, StateManager,
    VERSION,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// modforge - versioned builds for module loader applications
#[derive(Parser, Debug)]
#[command(name = "modforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: Utf8PathBuf,

    /// Debug logging and unwrapped scripts with sourceURL tags
    #[arg(short, long, global = true)]
    debug: bool,

    /// Log to the log file only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a versioned release of the project
    Build {
        /// Build variant (dev, test or prod)
        #[arg(short = 't', long = "type", default_value_t = BuildVariant::Production)]
        variant: BuildVariant,
    },

    /// Regenerate the development loader config in the project
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let project = cli
        .project
        .canonicalize_utf8()
        .with_context(|| format!("Project root not found: {}", cli.project))?;

    let config_manager = ConfigManager::new(&project);
    let mut settings = config_manager.load_settings()?;
    settings.debug |= cli.debug;

    let _guard = modforge::logging::setup_logging(
        &project.join(&settings.log_dir),
        APP_NAME,
        settings.debug,
        !cli.quiet,
    )?;

    tracing::info!("Starting {} v{} in {}", APP_NAME, VERSION, project);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create the tokio runtime")?;

    let state_manager = Arc::new(StateManager::new());

    match cli.command {
        Commands::Build { variant } => {
            let builder = Builder::from_project(&project, variant)?
                .with_debug(settings.debug)
                .with_state(Arc::clone(&state_manager));

            let report = runtime.block_on(async {
                let listener = spawn_state_listener(&state_manager);
                let result = builder.build().await;
                // Buffered events are logged before the report
                if let Err(e) = listener.await {
                    tracing::warn!("State listener stopped: {}", e);
                }
                result
            })?;

            tracing::info!(
                "Build {} written to {} ({} files, {} modules, {} locales)",
                report.build_id,
                report.output_root,
                report.files,
                report.modules,
                report.locale_bundles.len()
            );
        }
        Commands::Config => {
            let builder = Builder::from_project(&project, BuildVariant::Development)?
                .with_build_context(BuildContext::development(&project))
                .with_state(Arc::clone(&state_manager));

            let path = runtime.block_on(builder.write_config())?;
            tracing::info!("Development config written to {}", path);
        }
    }

    Ok(())
}

/// Log build progress from the state change stream.
///
/// The task ends after the build's terminal event.
fn spawn_state_listener(state_manager: &StateManager) -> tokio::task::JoinHandle<()> {
    let mut rx = state_manager.subscribe();
    tokio::spawn(async move {
        loop {
            let change = match rx.recv().await {
                Ok(change) => change,
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!("Skipped {} state events", missed);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match change {
                StateChange::PhaseChanged { phase } if phase != BuildPhase::Complete => {
                    tracing::info!("Phase: {}", phase.as_str());
                }
                StateChange::TraversalComplete { files } => {
                    tracing::debug!("Traversal reported {} files", files);
                }
                StateChange::LocaleCompiled { locale } => {
                    tracing::debug!("Locale {} ready", locale);
                }
                StateChange::ConfigWritten { path } => {
                    tracing::debug!("Loader config at {}", path);
                }
                StateChange::BuildComplete { .. } | StateChange::BuildFailed { .. } => break,
                StateChange::PhaseChanged { .. } => {}
            }
        }
    })
}
