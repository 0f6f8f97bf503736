// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slot admission specs.

use super::prelude::*;

#[tokio::test]
async fn dispatch_is_rejected_at_capacity() {
    let adapter =
        Arc::new(FakeRuntime::new("hang").with_behavior(FakeBehavior::HangUntilCancelled));
    let worker =
        Worker::start(1, FakeWorkspaces::new(), HarnessRuntimeRouter::uniform(adapter));

    let response = worker.dispatch(spec_request("run-X")).await;
    assert_eq!(response, Response::Dispatch { accepted: true, reason: None });

    let response = worker.dispatch(spec_request("run-Y")).await;
    assert_eq!(
        response,
        Response::Dispatch { accepted: false, reason: Some("worker at capacity".to_string()) }
    );

    // Freeing the slot re-opens admission.
    worker.gateway.handle(Request::Cancel { run_id: "run-X".into() }).await;
    worker.wait_terminal("run-X").await;
    for _ in 0..100 {
        if worker.queue.can_accept() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let response = worker.dispatch(spec_request("run-Y")).await;
    assert_eq!(response, Response::Dispatch { accepted: true, reason: None });
}

#[tokio::test]
async fn blank_run_id_is_rejected() {
    let adapter = Arc::new(FakeRuntime::succeeding("fake", RunEnvelope::succeeded("ok")));
    let worker =
        Worker::start(1, FakeWorkspaces::new(), HarnessRuntimeRouter::uniform(adapter));
    let response = worker.dispatch(spec_request("")).await;
    assert_eq!(
        response,
        Response::Dispatch { accepted: false, reason: Some("run_id is required".to_string()) }
    );
}
