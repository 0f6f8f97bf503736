// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::container::FakeContainerRuntime;
use crate::runtime::{FakeBehavior, FakeRuntime};
use ad_core::{JobEvent, RunEnvelope, RunId, RunRequest};
use tokio::sync::mpsc;
use yare::parameterized;

fn router() -> HarnessRuntimeRouter {
    HarnessRuntimeRouter::new(Arc::new(FakeContainerRuntime::new()))
}

fn sink() -> (EventSink, mpsc::UnboundedReceiver<JobEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink::new(RunId::new("run-A"), None, tx), rx)
}

#[parameterized(
    codex_default = { "codex", "", "codex-app-server", true, "app-server" },
    codex_app_server = { "codex", "app-server", "codex-app-server", true, "app-server" },
    codex_structured = { "codex", "structured", "codex-app-server", true, "app-server" },
    codex_auto = { "codex", "auto", "codex-app-server", true, "app-server" },
    codex_command = { "codex", "command", "command", false, "command" },
    opencode = { "opencode", "", "opencode-sse", false, "sse" },
    opencode_dashed = { "open-code", "", "opencode-sse", false, "sse" },
    opencode_spaced = { "open code", "", "opencode-sse", false, "sse" },
    claude = { "claude", "", "claude-stream", true, "stream-json" },
    claude_code = { "claude-code", "", "claude-stream", true, "stream-json" },
    claude_spaced = { "claude code", "", "claude-stream", true, "stream-json" },
    zai = { "zai", "", "zai-claude", true, "stream-json" },
    unknown = { "mystery", "", "command", false, "command" },
    case_folded = { "CoDeX", "", "codex-app-server", true, "app-server" },
)]
fn routes_follow_the_table(
    harness: &str,
    mode: &str,
    primary: &str,
    has_fallback: bool,
    advertised: &str,
) {
    let decision = router().route(harness, mode);
    assert_eq!(decision.primary.name(), primary);
    assert_eq!(decision.fallback.is_some(), has_fallback);
    if let Some(fallback) = decision.fallback {
        assert_eq!(fallback.name(), "command");
    }
    assert_eq!(decision.advertised_mode, advertised);
}

#[tokio::test]
async fn primary_success_returns_primary_name() {
    let fake = Arc::new(FakeRuntime::succeeding("fake", RunEnvelope::succeeded("ok")));
    let router = HarnessRuntimeRouter::uniform(fake);
    let (sink, _rx) = sink();
    let request = RunRequest::builder().harness("codex").build();

    let routed = router
        .execute(&request, &RunContext::default(), &sink, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(routed.runtime_name, "fake");
    assert!(routed.result.envelope.is_succeeded());
    assert!(!routed
        .result
        .envelope
        .metadata
        .contains_key(ad_core::envelope::meta::STRUCTURED_RUNTIME_FALLBACK));
}

#[tokio::test]
async fn fallback_runs_after_structured_failure() {
    let structured = Arc::new(FakeRuntime::new("structured").with_behavior(FakeBehavior::FailIncomplete));
    let command = Arc::new(FakeRuntime::succeeding("command", RunEnvelope::succeeded("done")));
    let router = HarnessRuntimeRouter::split(structured.clone(), command.clone());
    let (sink, mut rx) = sink();
    let request = RunRequest::builder().harness("codex").build();

    let routed = router
        .execute(&request, &RunContext::default(), &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(routed.runtime_name, "command");
    assert_eq!(routed.runtime_mode, "command");
    let metadata = &routed.result.envelope.metadata;
    assert_eq!(
        metadata.get(ad_core::envelope::meta::STRUCTURED_RUNTIME_FALLBACK).map(String::as_str),
        Some("true")
    );
    assert!(metadata
        .get(ad_core::envelope::meta::STRUCTURED_RUNTIME_FAILURE)
        .is_some());
    assert_eq!(command.calls().len(), 1);

    // A diagnostic event citing the primary precedes the fallback run.
    let mut found = false;
    while let Ok(event) = rx.try_recv() {
        if event.category == "error" && event.summary.contains("Structured runtime 'structured' failed")
        {
            found = true;
        }
    }
    assert!(found, "expected a diagnostic event for the fallback");
}

#[tokio::test]
async fn no_fallback_without_a_registered_one() {
    let fake = Arc::new(FakeRuntime::new("solo").with_behavior(FakeBehavior::FailRuntime("boom".into())));
    let router = HarnessRuntimeRouter::uniform(fake);
    let (sink, _rx) = sink();
    // Unknown harness routes to command with no fallback.
    let request = RunRequest::builder().harness("mystery").build();

    let err = router
        .execute(&request, &RunContext::default(), &sink, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Runtime(_)));
}

#[tokio::test]
async fn cancellation_is_never_retried() {
    let structured =
        Arc::new(FakeRuntime::new("structured").with_behavior(FakeBehavior::HangUntilCancelled));
    let command = Arc::new(FakeRuntime::succeeding("command", RunEnvelope::succeeded("done")));
    let router = HarnessRuntimeRouter::split(structured, command.clone());
    let (sink, _rx) = sink();
    let request = RunRequest::builder().harness("claude").build();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = router
        .execute(&request, &RunContext::default(), &sink, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancellation());
    assert!(command.calls().is_empty(), "fallback must not run after cancellation");
}
