// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy-path specs: diff produced, and the no-diff obsolete variant.

use super::prelude::*;

#[tokio::test]
async fn diff_producing_run_succeeds_and_pushes() {
    let adapter = Arc::new(FakeRuntime::new("codex-app-server").with_behavior(
        FakeBehavior::Succeed {
            events: vec![
                (RuntimeEventType::AssistantDelta, "creating the file".into()),
                (RuntimeEventType::DiffUpdated, "diff --git a/new b/new".into()),
            ],
            envelope: RunEnvelope::succeeded("Created new file"),
        },
    ));
    let worker = Worker::start(
        2,
        FakeWorkspaces::new().with_diff(),
        HarnessRuntimeRouter::uniform(adapter),
    );
    let mut rx = worker.bus.subscribe();

    let response = worker.dispatch(spec_request("run-A")).await;
    assert_eq!(response, Response::Dispatch { accepted: true, reason: None });

    assert_eq!(worker.wait_terminal("run-A").await, RunState::Succeeded);

    let envelope = worker.envelope("run-A");
    assert_eq!(
        envelope.metadata.get(meta::GIT_WORKFLOW).map(String::as_str),
        Some("main-pushed")
    );

    let events = drain_events(&mut rx, "run-A");
    let categories: Vec<&str> = events.iter().map(|e| e.category.as_str()).collect();
    assert!(categories.contains(&"assistant.delta"));
    assert!(categories.contains(&"diff.updated"));
    assert!(categories.contains(&"run.completed"));

    // The completed event is last, and per-run sequences only increase.
    let last = events.last().unwrap();
    assert_eq!(last.event_type, JobEventType::Completed);
    let sequences: Vec<u64> =
        events.iter().filter(|e| e.sequence > 0).map(|e| e.sequence).collect();
    let mut sorted = sequences.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sequences, sorted, "sequences must be strictly increasing");
}

#[tokio::test]
async fn no_diff_run_is_obsolete_without_a_push() {
    let adapter = Arc::new(FakeRuntime::succeeding(
        "codex-app-server",
        RunEnvelope::succeeded("inspected, nothing to change"),
    ));
    let workspaces = FakeWorkspaces::new();
    let worker =
        Worker::start(2, workspaces.clone(), HarnessRuntimeRouter::uniform(adapter));

    worker.dispatch(spec_request("run-B")).await;
    assert_eq!(worker.wait_terminal("run-B").await, RunState::Obsolete);

    let envelope = worker.envelope("run-B");
    assert!(envelope.is_succeeded());
    assert_eq!(envelope.summary, "No changes produced");
    assert_eq!(
        envelope.metadata.get(meta::RUN_DISPOSITION).map(String::as_str),
        Some("obsolete")
    );
    assert_eq!(
        envelope.metadata.get(meta::OBSOLETE_REASON).map(String::as_str),
        Some("no-diff")
    );
    // Finalize ran exactly once, and nothing was pushed.
    assert_eq!(workspaces.finalized(), vec!["run-B".to_string()]);
    assert!(!envelope.metadata.contains_key(meta::GIT_FAILURE));
}
