// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure taxonomy and adapter-driven classification.

use crate::envelope::{EnvelopeStatus, RunEnvelope};
use serde::{Deserialize, Serialize};

/// Canonical failure classes surfaced in envelope metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureClass {
    None,
    AuthenticationError,
    RateLimitExceeded,
    Timeout,
    ResourceExhausted,
    InvalidInput,
    ConfigurationError,
    NetworkError,
    PermissionDenied,
    NotFound,
    InternalError,
    Unknown,
}

crate::simple_display! {
    FailureClass {
        None => "None",
        AuthenticationError => "AuthenticationError",
        RateLimitExceeded => "RateLimitExceeded",
        Timeout => "Timeout",
        ResourceExhausted => "ResourceExhausted",
        InvalidInput => "InvalidInput",
        ConfigurationError => "ConfigurationError",
        NetworkError => "NetworkError",
        PermissionDenied => "PermissionDenied",
        NotFound => "NotFound",
        InternalError => "InternalError",
        Unknown => "Unknown",
    }
}

/// Classification verdict for one completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureVerdict {
    pub class: FailureClass,
    pub is_retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_backoff_sec: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remediation_hints: Vec<String>,
}

impl FailureVerdict {
    fn none() -> Self {
        Self {
            class: FailureClass::None,
            is_retryable: false,
            suggested_backoff_sec: None,
            remediation_hints: Vec::new(),
        }
    }

    fn new(class: FailureClass, is_retryable: bool) -> Self {
        Self { class, is_retryable, suggested_backoff_sec: None, remediation_hints: Vec::new() }
    }

    fn backoff(mut self, seconds: u64) -> Self {
        self.suggested_backoff_sec = Some(seconds);
        self
    }

    fn hint(mut self, hint: &str) -> Self {
        self.remediation_hints.push(hint.to_string());
        self
    }
}

/// Map a completed envelope plus the container exit code to a verdict.
///
/// Matching is keyword-driven over the error and summary text; the first
/// matching class wins, ordered roughly by specificity. Exit code 137
/// (SIGKILL, typically the OOM killer) classifies as resource
/// exhaustion even without matching text.
pub fn classify_failure(envelope: &RunEnvelope, exit_code: Option<i32>) -> FailureVerdict {
    if envelope.status == Some(EnvelopeStatus::Succeeded) {
        return FailureVerdict::none();
    }

    let mut text = envelope.error.clone().unwrap_or_default();
    text.push(' ');
    text.push_str(&envelope.summary);
    let text = text.to_ascii_lowercase();

    let contains = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if contains(&["401", "unauthorized", "authentication", "invalid api key", "login"]) {
        return FailureVerdict::new(FailureClass::AuthenticationError, false)
            .hint("verify harness credentials are present and unexpired");
    }
    if contains(&["429", "rate limit", "too many requests", "quota exceeded"]) {
        return FailureVerdict::new(FailureClass::RateLimitExceeded, true)
            .backoff(60)
            .hint("reduce dispatch rate or raise the provider quota");
    }
    if contains(&["timed out", "timeout", "deadline exceeded", "cancelled or exceeded"]) {
        return FailureVerdict::new(FailureClass::Timeout, true)
            .backoff(30)
            .hint("raise timeout_sec or reduce the task scope");
    }
    if exit_code == Some(137) || contains(&["out of memory", "oom", "no space left"]) {
        return FailureVerdict::new(FailureClass::ResourceExhausted, true)
            .backoff(120)
            .hint("raise the sandbox memory limit");
    }
    if contains(&["permission denied", "403", "forbidden", "read-only file system"]) {
        return FailureVerdict::new(FailureClass::PermissionDenied, false)
            .hint("check repository access and sandbox profile");
    }
    if contains(&["not found", "404", "no such", "unknown revision"]) {
        return FailureVerdict::new(FailureClass::NotFound, false);
    }
    if contains(&["network", "connection refused", "connection reset", "dns", "unreachable"]) {
        return FailureVerdict::new(FailureClass::NetworkError, true).backoff(30);
    }
    if contains(&["invalid input", "invalid argument", "usage:", "malformed"]) {
        return FailureVerdict::new(FailureClass::InvalidInput, false);
    }
    if contains(&["configuration", "config invalid", "missing required env", "misconfigured"]) {
        return FailureVerdict::new(FailureClass::ConfigurationError, false)
            .hint("inspect the worker and harness configuration");
    }
    if contains(&["panic", "internal error", "crashed", "assertion"]) {
        return FailureVerdict::new(FailureClass::InternalError, false);
    }

    FailureVerdict::new(FailureClass::Unknown, false)
}

#[cfg(test)]
#[path = "failure_tests.rs"]
mod tests;
