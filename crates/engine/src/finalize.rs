// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelope finalisation: validation, metadata stamping, failure
//! classification, and artifact extraction.

use crate::mcp::McpInfo;
use ad_core::{
    classify_failure, envelope::meta, ArtifactPolicy, EnvelopeArtifact, EnvelopeStatus,
    RunEnvelope,
};
use std::path::Path;
use tracing::warn;

/// Error set when an adapter returned an envelope missing its required
/// fields.
const VALIDATION_ERROR: &str =
    "Envelope validation failed: missing required fields (status, summary)";

/// Inputs the finalizer stamps onto the envelope.
pub struct FinalizeContext<'a> {
    pub runtime_name: &'a str,
    pub runtime_mode: &'a str,
    pub exit_code: Option<i64>,
    pub mcp: &'a McpInfo,
    pub workspace_host_path: Option<&'a Path>,
    pub artifact_policy: &'a ArtifactPolicy,
}

/// Finalize a completed adapter envelope in place.
pub fn finalize_envelope(envelope: &mut RunEnvelope, ctx: &FinalizeContext<'_>) {
    validate(envelope);
    stamp_runtime(envelope, ctx);
    classify(envelope, ctx.exit_code);
    if let Some(workspace) = ctx.workspace_host_path {
        extract_artifacts(envelope, workspace, ctx.artifact_policy);
    }
}

/// A valid envelope has a status and a non-empty summary; anything else
/// is downgraded to a failure.
fn validate(envelope: &mut RunEnvelope) {
    let missing = envelope.status.is_none() || envelope.summary.trim().is_empty();
    if !missing {
        return;
    }
    envelope.status = Some(EnvelopeStatus::Failed);
    if envelope.error.is_none() {
        envelope.error = Some(VALIDATION_ERROR.to_string());
    }
    if envelope.summary.trim().is_empty() {
        envelope.summary = "Envelope validation failed".to_string();
    }
}

fn stamp_runtime(envelope: &mut RunEnvelope, ctx: &FinalizeContext<'_>) {
    envelope.stamp(meta::RUNTIME_MODE, ctx.runtime_mode);
    envelope.stamp(meta::RUNTIME_NAME, ctx.runtime_name);
    envelope.stamp(meta::MCP_CONFIG_PRESENT, ctx.mcp.present.to_string());
    envelope.stamp(meta::MCP_CONFIG_VALID, ctx.mcp.valid.to_string());
    if let Some(path) = &ctx.mcp.path {
        envelope.stamp(meta::MCP_CONFIG_PATH, path.display().to_string());
    }
    envelope.stamp(
        meta::MCP_INSTALL_ACTION_COUNT,
        ctx.mcp.install_action_count.to_string(),
    );
    if !ctx.mcp.diagnostics.is_empty() {
        let joined: Vec<&str> =
            ctx.mcp.diagnostics.iter().take(4).map(String::as_str).collect();
        envelope.stamp(meta::MCP_DIAGNOSTICS, joined.join(" | "));
    }
}

fn classify(envelope: &mut RunEnvelope, exit_code: Option<i64>) {
    let exit = exit_code.and_then(|c| i32::try_from(c).ok());
    let verdict = classify_failure(envelope, exit);
    envelope.stamp(meta::FAILURE_CLASS, verdict.class.to_string());
    envelope.stamp(meta::IS_RETRYABLE, verdict.is_retryable.to_string());
    if let Some(backoff) = verdict.suggested_backoff_sec {
        envelope.stamp(meta::SUGGESTED_BACKOFF_SECONDS, backoff.to_string());
    }
    if !verdict.remediation_hints.is_empty() {
        envelope.stamp(meta::REMEDIATION_HINTS, verdict.remediation_hints.join("; "));
    }
}

/// Walk the workspace breadth-first, recording files until either policy
/// bound is hit.
fn extract_artifacts(envelope: &mut RunEnvelope, workspace: &Path, policy: &ArtifactPolicy) {
    let mut artifacts: Vec<EnvelopeArtifact> = Vec::new();
    let mut total_bytes: u64 = 0;
    let mut queue = std::collections::VecDeque::from([workspace.to_path_buf()]);

    'walk: while let Some(dir) = queue.pop_front() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "artifact walk: unreadable directory");
                continue;
            }
        };
        let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name();
            if name == ".git" {
                continue;
            }
            let Ok(file_type) = entry.file_type() else { continue };
            if file_type.is_dir() {
                queue.push_back(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if artifacts.len() >= policy.max_artifacts
                || total_bytes.saturating_add(size) > policy.max_total_bytes
            {
                break 'walk;
            }
            total_bytes += size;
            let relative = path
                .strip_prefix(workspace)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();
            artifacts.push(EnvelopeArtifact { path: relative, size_bytes: size });
        }
    }

    envelope.stamp(meta::EXTRACTED_ARTIFACT_COUNT, artifacts.len().to_string());
    envelope.stamp(meta::EXTRACTED_ARTIFACT_SIZE, total_bytes.to_string());
    envelope.artifacts = artifacts;
}

#[cfg(test)]
#[path = "finalize_tests.rs"]
mod tests;
