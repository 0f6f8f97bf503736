// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container lifecycle behind the [`ContainerRuntime`] trait.
//!
//! Every orchestrator container is stamped with the run/task/repo labels
//! so it can be found again after a crash; the presence of the run-id
//! label is the sole predicate for "is an orchestrator container" during
//! reconciliation.

mod docker;

pub use docker::DockerCli;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeContainerRuntime;

use ad_core::{ContainerId, RunId, SandboxProfile};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Label carrying the run id; presence marks an orchestrator container.
pub const LABEL_RUN_ID: &str = "orchestrator.run-id";
/// Label carrying the task id.
pub const LABEL_TASK_ID: &str = "orchestrator.task-id";
/// Label carrying the repository id.
pub const LABEL_REPO_ID: &str = "orchestrator.repo-id";

/// Flush threshold for log streaming: accumulated bytes before a chunk
/// is pushed downstream.
pub const LOG_FLUSH_BYTES: usize = 4096;

/// Errors from container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("create failed: {0}")]
    CreateFailed(String),
    #[error("start failed: {0}")]
    StartFailed(String),
    #[error("wait failed: {0}")]
    WaitFailed(String),
    #[error("log streaming failed: {0}")]
    LogsFailed(String),
    #[error("container {container} is labelled for run {actual}, expected {expected}")]
    LabelMismatch { container: String, expected: String, actual: String },
    #[error("container runtime error: {0}")]
    Runtime(String),
}

/// Everything needed to create one run container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub cmd: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Extra labels; the orchestrator labels are always added on top.
    pub labels: HashMap<String, String>,
    pub run_id: RunId,
    pub task_id: String,
    pub repo_id: String,
    pub workspace_host_path: Option<PathBuf>,
    pub artifacts_host_path: Option<PathBuf>,
    pub sandbox: SandboxProfile,
}

/// A container observed via the orchestrator labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorContainer {
    pub container_id: ContainerId,
    pub run_id: RunId,
    pub task_id: String,
    pub repo_id: String,
    pub state: String,
    pub image: String,
    pub created_at: String,
}

/// Container lifecycle operations used by the runtime adapters and the
/// orphan reconciler.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container from the spec. Does not start it.
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError>;

    /// Start a created container.
    async fn start(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stream merged stdout+stderr as UTF-8 chunks into `tx`.
    ///
    /// Chunks are flushed once [`LOG_FLUSH_BYTES`] have accumulated or on
    /// EOF; the stream ends when the container exits. Cancellation stops
    /// reading without waiting for further output. Before attaching, the
    /// container's run-id label is verified against `expected_run_id`.
    async fn stream_logs(
        &self,
        id: &ContainerId,
        expected_run_id: &RunId,
        tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<(), ContainerError>;

    /// Block until the container exits; returns its exit status.
    async fn wait(&self, id: &ContainerId) -> Result<i64, ContainerError>;

    /// Force-remove a container. A missing container is not an error.
    async fn remove(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop (or force-remove) every container labelled with this run id.
    ///
    /// Graceful stop waits 5 s; `force` removes immediately. Returns the
    /// ids that were acted on.
    async fn kill_by_run_id(
        &self,
        run_id: &RunId,
        force: bool,
    ) -> Result<Vec<ContainerId>, ContainerError>;

    /// All containers carrying the `orchestrator.run-id` label.
    async fn list_labeled(&self) -> Result<Vec<OrchestratorContainer>, ContainerError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
