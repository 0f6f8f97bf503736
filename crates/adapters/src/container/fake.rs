// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory container runtime for tests.

use super::{ContainerError, ContainerRuntime, ContainerSpec, OrchestratorContainer};
use ad_core::{ContainerId, RunId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeState {
    chunks: Vec<String>,
    exit_code: i64,
    hang_on_wait: bool,
    next_id: u32,
    created: Vec<ContainerSpec>,
    live: Vec<OrchestratorContainer>,
    removed: Vec<ContainerId>,
}

/// In-memory [`ContainerRuntime`] with scripted log output.
#[derive(Clone, Default)]
pub struct FakeContainerRuntime {
    state: Arc<Mutex<FakeState>>,
}

impl FakeContainerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the log chunks streamed by the next container.
    pub fn with_chunks(self, chunks: Vec<String>) -> Self {
        self.state.lock().chunks = chunks;
        self
    }

    /// Script the exit code returned by `wait`.
    pub fn with_exit_code(self, code: i64) -> Self {
        self.state.lock().exit_code = code;
        self
    }

    /// Make `wait` block until the caller is cancelled.
    pub fn hanging(self) -> Self {
        self.state.lock().hang_on_wait = true;
        self
    }

    /// Register a pre-existing labelled container (for reconciler tests).
    pub fn add_labeled(&self, container: OrchestratorContainer) {
        self.state.lock().live.push(container);
    }

    /// Specs passed to `create` so far.
    pub fn created_specs(&self) -> Vec<ContainerSpec> {
        self.state.lock().created.clone()
    }

    /// Containers removed (force or via kill) so far.
    pub fn removed(&self) -> Vec<ContainerId> {
        self.state.lock().removed.clone()
    }

    /// Currently live labelled containers.
    pub fn live(&self) -> Vec<OrchestratorContainer> {
        self.state.lock().live.clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainerRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = ContainerId::new(format!("fake-{}", state.next_id));
        state.created.push(spec.clone());
        state.live.push(OrchestratorContainer {
            container_id: id.clone(),
            run_id: spec.run_id.clone(),
            task_id: spec.task_id.clone(),
            repo_id: spec.repo_id.clone(),
            state: "created".to_string(),
            image: spec.image.clone(),
            created_at: String::new(),
        });
        Ok(id)
    }

    async fn start(&self, _id: &ContainerId) -> Result<(), ContainerError> {
        Ok(())
    }

    async fn stream_logs(
        &self,
        _id: &ContainerId,
        _expected_run_id: &RunId,
        tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<(), ContainerError> {
        let chunks = self.state.lock().chunks.clone();
        for chunk in chunks {
            if cancel.is_cancelled() {
                break;
            }
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
        if self.state.lock().hang_on_wait {
            cancel.cancelled().await;
        }
        Ok(())
    }

    async fn wait(&self, _id: &ContainerId) -> Result<i64, ContainerError> {
        if self.state.lock().hang_on_wait {
            std::future::pending::<()>().await;
        }
        Ok(self.state.lock().exit_code)
    }

    async fn remove(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        state.live.retain(|c| &c.container_id != id);
        state.removed.push(id.clone());
        Ok(())
    }

    async fn kill_by_run_id(
        &self,
        run_id: &RunId,
        _force: bool,
    ) -> Result<Vec<ContainerId>, ContainerError> {
        let mut state = self.state.lock();
        let killed: Vec<ContainerId> = state
            .live
            .iter()
            .filter(|c| c.run_id.normalized() == run_id.normalized())
            .map(|c| c.container_id.clone())
            .collect();
        state.live.retain(|c| c.run_id.normalized() != run_id.normalized());
        state.removed.extend(killed.iter().cloned());
        Ok(killed)
    }

    async fn list_labeled(&self) -> Result<Vec<OrchestratorContainer>, ContainerError> {
        Ok(self.state.lock().live.clone())
    }
}
