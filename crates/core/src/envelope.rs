// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The canonical result object returned by a runtime adapter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata keys stamped on envelopes by the pipeline.
///
/// Kept as constants so the finalizer, the git workflow, and the tests
/// agree on spelling.
pub mod meta {
    pub const RUNTIME_MODE: &str = "runtimeMode";
    pub const RUNTIME_NAME: &str = "runtimeName";
    pub const RUN_DISPOSITION: &str = "runDisposition";
    pub const OBSOLETE_REASON: &str = "obsoleteReason";
    pub const GIT_WORKFLOW: &str = "gitWorkflow";
    pub const GIT_WORKFLOW_REASON: &str = "gitWorkflowReason";
    pub const GIT_FAILURE: &str = "gitFailure";
    pub const STRUCTURED_RUNTIME_FALLBACK: &str = "structuredRuntimeFallback";
    pub const STRUCTURED_RUNTIME_FAILURE: &str = "structuredRuntimeFailure";
    pub const FAILURE_CLASS: &str = "failureClass";
    pub const IS_RETRYABLE: &str = "isRetryable";
    pub const SUGGESTED_BACKOFF_SECONDS: &str = "suggestedBackoffSeconds";
    pub const REMEDIATION_HINTS: &str = "remediationHints";
    pub const MCP_CONFIG_PRESENT: &str = "mcpConfigPresent";
    pub const MCP_CONFIG_VALID: &str = "mcpConfigValid";
    pub const MCP_CONFIG_PATH: &str = "mcpConfigPath";
    pub const MCP_INSTALL_ACTION_COUNT: &str = "mcpInstallActionCount";
    pub const MCP_DIAGNOSTICS: &str = "mcpDiagnostics";
    pub const EXTRACTED_ARTIFACT_COUNT: &str = "extractedArtifactCount";
    pub const EXTRACTED_ARTIFACT_SIZE: &str = "extractedArtifactSize";
}

/// Outcome reported by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Succeeded,
    Failed,
    Unknown,
}

crate::simple_display! {
    EnvelopeStatus {
        Succeeded => "succeeded",
        Failed => "failed",
        Unknown => "unknown",
    }
}

/// A file recorded from the workspace after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeArtifact {
    /// Path relative to the workspace root.
    pub path: String,
    pub size_bytes: u64,
}

/// Result object for one adapter invocation.
///
/// A valid envelope has a status and a non-empty summary; the finalizer
/// downgrades anything else to `failed`. `status=succeeded` combined with
/// `metadata.runDisposition=obsolete` encodes "no-diff success".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunEnvelope {
    /// Missing status is an invalid envelope, not `unknown`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EnvelopeStatus>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<EnvelopeArtifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output_ref: Option<String>,
}

impl RunEnvelope {
    /// A succeeded envelope with the given summary.
    pub fn succeeded(summary: impl Into<String>) -> Self {
        Self {
            status: Some(EnvelopeStatus::Succeeded),
            summary: summary.into(),
            ..Default::default()
        }
    }

    /// A failed envelope with the given summary and error detail.
    pub fn failed(summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: Some(EnvelopeStatus::Failed),
            summary: summary.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == Some(EnvelopeStatus::Succeeded)
    }

    /// Set a metadata key, replacing any previous value.
    pub fn stamp(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Whether this envelope encodes a no-diff success.
    pub fn is_obsolete(&self) -> bool {
        self.is_succeeded()
            && self.metadata.get(meta::RUN_DISPOSITION).map(String::as_str) == Some("obsolete")
    }

    /// Mark this envelope as a no-diff success.
    pub fn mark_obsolete(&mut self, reason: &str) {
        self.status = Some(EnvelopeStatus::Succeeded);
        self.summary = "No changes produced".to_string();
        self.stamp(meta::RUN_DISPOSITION, "obsolete");
        self.stamp(meta::OBSOLETE_REASON, reason);
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
