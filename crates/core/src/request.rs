// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch input: the immutable description of one run.

use crate::id::{RepoId, RunId, TaskId};
use crate::units;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Default container image when the request does not name one.
pub const DEFAULT_IMAGE: &str = "agentsdashboard/harness:latest";

/// Errors from request validation at the dispatch boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("run_id is required")]
    MissingRunId,
}

/// Resource limits applied to the run's container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxProfile {
    /// Fractional cores (1.0 = one core).
    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: f64,
    /// Memory limit string (`"2g"`, `"512m"`, or bare bytes).
    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,
    #[serde(default)]
    pub network_disabled: bool,
    #[serde(default)]
    pub read_only_root_fs: bool,
}

fn default_cpu_limit() -> f64 {
    1.0
}

fn default_memory_limit() -> String {
    "2g".to_string()
}

impl Default for SandboxProfile {
    fn default() -> Self {
        Self {
            cpu_limit: default_cpu_limit(),
            memory_limit: default_memory_limit(),
            network_disabled: false,
            read_only_root_fs: false,
        }
    }
}

impl SandboxProfile {
    /// Memory limit in bytes (malformed strings fall back to 2 GiB).
    pub fn memory_bytes(&self) -> u64 {
        units::parse_size(&self.memory_limit)
    }
}

/// Bounds on post-run artifact extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPolicy {
    pub max_artifacts: usize,
    pub max_total_bytes: u64,
}

impl Default for ArtifactPolicy {
    fn default() -> Self {
        Self { max_artifacts: 50, max_total_bytes: 64 * 1024 * 1024 }
    }
}

/// One piece of structured prompt input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPart {
    pub kind: String,
    pub content: String,
}

/// An image attached to the prompt, carried inline as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub file_name: String,
    pub media_type: String,
    pub data_base64: String,
}

/// Immutable dispatch input for one run.
///
/// `run_id` is the system-wide unique key; everything else describes what
/// to execute and where to put the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub run_id: RunId,
    pub repository_id: RepoId,
    pub task_id: TaskId,
    /// Harness name (e.g. "codex", "claude"); routed case-insensitively.
    pub harness: String,
    /// Requested runtime mode ("app-server", "command", ...). Empty means
    /// "let the router decide".
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub prompt: String,
    /// Shell command for command-mode runs.
    #[serde(default)]
    pub command: String,
    /// Wall-clock budget for the run; `None` uses the worker default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,
    #[serde(default)]
    pub sandbox: SandboxProfile,
    #[serde(default)]
    pub artifact_policy: ArtifactPolicy,
    /// Container image; empty means [`DEFAULT_IMAGE`].
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Extra labels stamped on the run's container.
    #[serde(default)]
    pub container_labels: HashMap<String, String>,
    pub clone_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_parts: Vec<InputPart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_attachments: Vec<ImageAttachment>,
    /// Raw MCP server configuration, validated and materialized per run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_config_json: Option<String>,
    /// Structured-event schema version override for this run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_protocol_version: Option<String>,
}

impl RunRequest {
    /// Validate the request at the dispatch boundary.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.run_id.as_str().trim().is_empty() {
            return Err(RequestError::MissingRunId);
        }
        Ok(())
    }

    /// Container image for this run.
    pub fn image(&self) -> &str {
        if self.image.is_empty() {
            DEFAULT_IMAGE
        } else {
            &self.image
        }
    }
}

crate::builder! {
    pub struct RunRequestBuilder => RunRequest {
        into run_id: RunId = "run-1",
        into repository_id: RepoId = "repo-1",
        into task_id: TaskId = "task-1",
        into harness: String = "command",
        into mode: String = "",
        into prompt: String = "",
        into command: String = "true",
        into image: String = "",
        into clone_url: String = "https://github.com/acme/widgets.git",
        set timeout_sec: Option<u64> = None,
        set sandbox: SandboxProfile = SandboxProfile::default(),
        set artifact_policy: ArtifactPolicy = ArtifactPolicy::default(),
        set env: HashMap<String, String> = HashMap::new(),
        set container_labels: HashMap<String, String> = HashMap::new(),
        set input_parts: Vec<InputPart> = Vec::new(),
        set image_attachments: Vec<ImageAttachment> = Vec::new(),
        opt branch: String = None,
        opt mcp_config_json: String = None,
        opt structured_protocol_version: String = None,
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
