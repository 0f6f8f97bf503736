// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn failed(error: &str) -> RunEnvelope {
    RunEnvelope::failed("run failed", error)
}

#[test]
fn succeeded_envelope_classifies_as_none() {
    let verdict = classify_failure(&RunEnvelope::succeeded("ok"), Some(0));
    assert_eq!(verdict.class, FailureClass::None);
    assert!(!verdict.is_retryable);
}

#[parameterized(
    auth = { "401 Unauthorized from api", FailureClass::AuthenticationError, false },
    rate_limit = { "429 Too Many Requests", FailureClass::RateLimitExceeded, true },
    timeout = { "Execution cancelled or exceeded timeout", FailureClass::Timeout, true },
    oom = { "container killed: out of memory", FailureClass::ResourceExhausted, true },
    permission = { "permission denied: /workspace", FailureClass::PermissionDenied, false },
    not_found = { "fatal: repository not found", FailureClass::NotFound, false },
    network = { "connection refused by proxy", FailureClass::NetworkError, true },
    invalid = { "invalid argument: --frob", FailureClass::InvalidInput, false },
    config = { "missing required env HARNESS_HOME", FailureClass::ConfigurationError, false },
    internal = { "thread panicked at runtime", FailureClass::InternalError, false },
    unknown = { "something odd happened", FailureClass::Unknown, false },
)]
fn classifies_by_error_text(error: &str, class: FailureClass, retryable: bool) {
    let verdict = classify_failure(&failed(error), Some(1));
    assert_eq!(verdict.class, class);
    assert_eq!(verdict.is_retryable, retryable);
}

#[test]
fn exit_137_is_resource_exhaustion_without_matching_text() {
    let verdict = classify_failure(&failed("harness stopped"), Some(137));
    assert_eq!(verdict.class, FailureClass::ResourceExhausted);
    assert!(verdict.is_retryable);
}

#[test]
fn rate_limit_suggests_backoff() {
    let verdict = classify_failure(&failed("rate limit exceeded"), None);
    assert_eq!(verdict.suggested_backoff_sec, Some(60));
    assert!(!verdict.remediation_hints.is_empty());
}

#[test]
fn summary_text_is_also_matched() {
    let envelope = RunEnvelope {
        status: Some(EnvelopeStatus::Failed),
        summary: "Run cancelled or timed out".to_string(),
        ..Default::default()
    };
    assert_eq!(classify_failure(&envelope, None).class, FailureClass::Timeout);
}

#[test]
fn class_display_matches_metadata_spelling() {
    assert_eq!(FailureClass::RateLimitExceeded.to_string(), "RateLimitExceeded");
    assert_eq!(FailureClass::None.to_string(), "None");
}
