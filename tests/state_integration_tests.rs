//! Integration tests for StateManager with state change events
//!
//! These tests verify that:
//! - A build emits its phases, traversal, config and locale events in order
//! - Build-complete fires exactly once per successful build
//! - A failed build emits BuildFailed and never BuildComplete
//! - Multiple subscribers see the same stream

mod common;

use common::{TRAVERSED_FILES, create_project};
use modforge::state::BuildPhase;
use modforge::{BuildVariant, Builder, StateChange, StateManager};
use std::fs;
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;

fn drain(rx: &mut Receiver<StateChange>) -> Vec<StateChange> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_build_event_stream() {
    let (_temp_dir, root) = create_project();
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    let report = Builder::from_project(&root, BuildVariant::Production)
        .unwrap()
        .with_state(Arc::clone(&state))
        .build()
        .await
        .unwrap();

    let events = drain(&mut rx);

    let phases: Vec<BuildPhase> = events
        .iter()
        .filter_map(|event| match event {
            StateChange::PhaseChanged { phase } => Some(*phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            BuildPhase::Cleaning,
            BuildPhase::Traversing,
            BuildPhase::WritingConfig,
            BuildPhase::CompilingLocales,
            BuildPhase::CopyingRuntime,
            BuildPhase::Complete,
        ]
    );

    assert!(events.contains(&StateChange::TraversalComplete {
        files: TRAVERSED_FILES
    }));
    assert!(events.contains(&StateChange::ConfigWritten {
        path: report.config_path.clone()
    }));

    let mut locales: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            StateChange::LocaleCompiled { locale } => Some(locale.as_str()),
            _ => None,
        })
        .collect();
    locales.sort();
    assert_eq!(locales, vec!["en_US", "fr_FR"]);

    let completions: Vec<&StateChange> = events
        .iter()
        .filter(|event| matches!(event, StateChange::BuildComplete { .. }))
        .collect();
    assert_eq!(
        completions,
        vec![&StateChange::BuildComplete {
            build_id: report.build_id.clone()
        }]
    );
    assert_eq!(events.last(), completions.last().copied());

    let snapshot = state.snapshot();
    assert_eq!(snapshot.phase, BuildPhase::Complete);
    assert_eq!(snapshot.modules_registered, common::REGISTERED_MODULES);
    assert!(!snapshot.is_running());
}

#[tokio::test]
async fn test_failed_build_never_completes() {
    let (_temp_dir, root) = create_project();
    fs::write(root.join("plugins/widgets/loose.css"), "a{}").unwrap();

    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    let result = Builder::from_project(&root, BuildVariant::Production)
        .unwrap()
        .with_state(Arc::clone(&state))
        .build()
        .await;
    assert!(result.is_err());

    let events = drain(&mut rx);
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, StateChange::BuildComplete { .. }))
    );
    assert!(matches!(
        events.last(),
        Some(StateChange::BuildFailed { message }) if message.contains("loose.css")
    ));
    assert_eq!(state.read(|s| s.phase), BuildPhase::Failed);
}

#[tokio::test]
async fn test_listener_sees_every_event_after_build_returns() {
    let (_temp_dir, root) = create_project();
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    // Collects until the terminal event, like the CLI's progress listener
    let listener = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Ok(event) = rx.recv().await {
            let terminal = matches!(
                event,
                StateChange::BuildComplete { .. } | StateChange::BuildFailed { .. }
            );
            seen.push(event);
            if terminal {
                break;
            }
        }
        seen
    });

    Builder::from_project(&root, BuildVariant::Production)
        .unwrap()
        .with_state(Arc::clone(&state))
        .build()
        .await
        .unwrap();
    let seen = listener.await.unwrap();

    assert!(seen.contains(&StateChange::PhaseChanged {
        phase: BuildPhase::CopyingRuntime
    }));
    assert!(
        seen.iter()
            .any(|event| matches!(event, StateChange::ConfigWritten { .. }))
    );
    assert!(matches!(
        seen.last(),
        Some(StateChange::BuildComplete { .. })
    ));
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();

    state.start_build("1");
    state.complete_build();

    let first = drain(&mut rx1);
    assert_eq!(first, drain(&mut rx2));
    assert_eq!(
        first.last(),
        Some(&StateChange::BuildComplete {
            build_id: "1".to_string()
        })
    );
}

#[tokio::test]
async fn test_concurrent_locale_updates() {
    let state = Arc::new(StateManager::new());
    let mut handles = Vec::new();

    for i in 0..10 {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            state.record_locale(&format!("locale_{}", i));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(state.read(|s| s.locales_compiled.len()), 10);
}
