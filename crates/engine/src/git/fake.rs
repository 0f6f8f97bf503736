// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable workspace seam for pipeline tests.

use super::{GitAuth, GitError, WorkspaceContext, Workspaces, GIT_WORKFLOW_PUSHED};
use ad_core::{envelope::meta, RunEnvelope, RunRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Default)]
struct FakeState {
    prepare_error: Option<String>,
    push_error: Option<String>,
    diff_produced: bool,
    prepared: Vec<String>,
    finalized: Vec<String>,
}

/// In-memory [`Workspaces`] with scripted outcomes.
#[derive(Clone, Default)]
pub struct FakeWorkspaces {
    state: Arc<Mutex<FakeState>>,
}

impl FakeWorkspaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a diff-producing run (finalize stamps a push).
    pub fn with_diff(self) -> Self {
        self.state.lock().diff_produced = true;
        self
    }

    /// Script a prepare failure.
    pub fn failing_prepare(self, message: impl Into<String>) -> Self {
        self.state.lock().prepare_error = Some(message.into());
        self
    }

    /// Script a push failure.
    pub fn failing_push(self, message: impl Into<String>) -> Self {
        self.state.lock().push_error = Some(message.into());
        self
    }

    /// Run ids prepared so far.
    pub fn prepared(&self) -> Vec<String> {
        self.state.lock().prepared.clone()
    }

    /// Run ids finalized so far.
    pub fn finalized(&self) -> Vec<String> {
        self.state.lock().finalized.clone()
    }
}

#[async_trait]
impl Workspaces for FakeWorkspaces {
    async fn prepare(&self, request: &RunRequest) -> Result<WorkspaceContext, GitError> {
        let mut state = self.state.lock();
        state.prepared.push(request.run_id.to_string());
        if let Some(message) = &state.prepare_error {
            return Err(GitError::CloneFailed(message.clone()));
        }
        Ok(WorkspaceContext {
            workspace_path: PathBuf::from("/tmp/fake-workspace"),
            main_branch: "main".to_string(),
            head_before: "a".repeat(40),
            auth: GitAuth::Direct,
        })
    }

    async fn finalize(
        &self,
        request: &RunRequest,
        _workspace: &WorkspaceContext,
        envelope: &mut RunEnvelope,
    ) {
        let (diff, push_error) = {
            let mut state = self.state.lock();
            state.finalized.push(request.run_id.to_string());
            (state.diff_produced, state.push_error.clone())
        };

        if !envelope.is_succeeded() {
            envelope.stamp(meta::GIT_WORKFLOW, "skipped");
            envelope.stamp(meta::GIT_WORKFLOW_REASON, "non-success-run");
            return;
        }
        if let Some(message) = push_error {
            envelope.status = Some(ad_core::EnvelopeStatus::Failed);
            envelope.summary = "Git commit/push failed".to_string();
            envelope.stamp(meta::GIT_WORKFLOW, "failed");
            envelope.stamp(meta::GIT_FAILURE, message);
            return;
        }
        if diff {
            envelope.stamp(meta::GIT_WORKFLOW, GIT_WORKFLOW_PUSHED);
        } else {
            envelope.mark_obsolete("no-diff");
        }
    }
}
