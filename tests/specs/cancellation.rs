// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mid-flight cancellation specs.

use super::prelude::*;

#[tokio::test]
async fn cancel_mid_flight_fails_the_envelope_and_reaps_the_container() {
    let adapter =
        Arc::new(FakeRuntime::new("hang").with_behavior(FakeBehavior::HangUntilCancelled));
    let worker =
        Worker::start(2, FakeWorkspaces::new(), HarnessRuntimeRouter::uniform(adapter));

    worker.dispatch(spec_request("run-C")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Seed a labelled container so the force-kill is observable.
    worker.containers.add_labeled(ad_adapters::container::OrchestratorContainer {
        container_id: ad_core::ContainerId::new("c-run-C"),
        run_id: RunId::new("run-C"),
        task_id: "task-1".into(),
        repo_id: "repo-1".into(),
        state: "running".into(),
        image: "img".into(),
        created_at: String::new(),
    });

    let response = worker.gateway.handle(Request::Cancel { run_id: "run-C".into() }).await;
    assert_eq!(response, Response::Cancel { accepted: true });

    assert_eq!(worker.wait_terminal("run-C").await, RunState::Cancelled);
    let envelope = worker.envelope("run-C");
    assert_eq!(envelope.summary, "Run cancelled or timed out");
    assert_eq!(envelope.error.as_deref(), Some("Execution cancelled or exceeded timeout"));
    // No commit/push is attempted for a cancelled run, and the envelope
    // says so.
    assert_eq!(envelope.metadata.get(meta::GIT_WORKFLOW).map(String::as_str), Some("skipped"));
    assert_eq!(
        envelope.metadata.get(meta::GIT_WORKFLOW_REASON).map(String::as_str),
        Some("non-success-run")
    );

    // The container is gone within the reconciler window (killed
    // directly here, and reconciliation would catch any straggler).
    for _ in 0..100 {
        if worker.containers.live().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(worker.containers.live().is_empty());
}

#[tokio::test]
async fn cancellation_is_idempotent_across_repeat_calls() {
    let adapter =
        Arc::new(FakeRuntime::new("hang").with_behavior(FakeBehavior::HangUntilCancelled));
    let worker =
        Worker::start(2, FakeWorkspaces::new(), HarnessRuntimeRouter::uniform(adapter));

    worker.dispatch(spec_request("run-C")).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    worker.gateway.handle(Request::Cancel { run_id: "run-C".into() }).await;
    let state = worker.wait_terminal("run-C").await;

    // Any suffix of cancel calls after the first leaves the terminal
    // state unchanged.
    for _ in 0..3 {
        worker.gateway.handle(Request::Cancel { run_id: "run-C".into() }).await;
        assert_eq!(
            worker.ledger.get_snapshot(&RunId::new("run-C")).unwrap().state,
            state
        );
    }
}

#[tokio::test]
async fn cancel_of_unknown_run_is_refused() {
    let adapter = Arc::new(FakeRuntime::succeeding("fake", RunEnvelope::succeeded("ok")));
    let worker =
        Worker::start(1, FakeWorkspaces::new(), HarnessRuntimeRouter::uniform(adapter));
    let response = worker.gateway.handle(Request::Cancel { run_id: "ghost".into() }).await;
    assert_eq!(response, Response::Cancel { accepted: false });
}
