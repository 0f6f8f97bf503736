// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured-runtime fallback specs.

use super::prelude::*;

#[tokio::test]
async fn primary_failure_falls_back_to_command_and_succeeds() {
    let structured = Arc::new(
        FakeRuntime::new("codex-app-server").with_behavior(FakeBehavior::FailIncomplete),
    );
    let command = Arc::new(FakeRuntime::succeeding(
        "command",
        RunEnvelope::succeeded("done via command"),
    ));
    let worker = Worker::start(
        2,
        FakeWorkspaces::new().with_diff(),
        HarnessRuntimeRouter::split(structured, command.clone()),
    );
    let mut rx = worker.bus.subscribe();

    worker.dispatch(spec_request("run-F")).await;
    assert_eq!(worker.wait_terminal("run-F").await, RunState::Succeeded);

    let envelope = worker.envelope("run-F");
    assert_eq!(
        envelope.metadata.get(meta::STRUCTURED_RUNTIME_FALLBACK).map(String::as_str),
        Some("true")
    );
    assert!(envelope
        .metadata
        .get(meta::STRUCTURED_RUNTIME_FAILURE)
        .is_some_and(|f| f.contains("completion")));
    assert_eq!(
        envelope.metadata.get(meta::RUNTIME_NAME).map(String::as_str),
        Some("command")
    );
    assert_eq!(command.calls().len(), 1);

    // A diagnostic citing the primary adapter precedes the fallback.
    let events = drain_events(&mut rx, "run-F");
    assert!(events.iter().any(|e| e.category == "error"
        && e.summary.contains("Structured runtime 'codex-app-server' failed")));
}

#[tokio::test]
async fn opencode_has_no_fallback() {
    let structured =
        Arc::new(FakeRuntime::new("opencode-sse").with_behavior(FakeBehavior::FailIncomplete));
    let command = Arc::new(FakeRuntime::succeeding("command", RunEnvelope::succeeded("nope")));
    let worker = Worker::start(
        2,
        FakeWorkspaces::new(),
        HarnessRuntimeRouter::split(structured, command.clone()),
    );

    let mut request = spec_request("run-O");
    request.harness = "opencode".to_string();
    worker.dispatch(request).await;

    assert_eq!(worker.wait_terminal("run-O").await, RunState::Failed);
    assert!(command.calls().is_empty(), "no fallback may run for opencode");
    let envelope = worker.envelope("run-O");
    assert_eq!(envelope.summary, "Harness execution crashed");
}
