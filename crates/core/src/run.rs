// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run state machine and the durable ledger row.

use crate::id::{RunId, TaskId};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a run.
///
/// Transitions form a DAG with no back-edges:
/// `Queued → Running → {Succeeded | Failed | Cancelled | Obsolete}`,
/// plus `Queued → Cancelled` for cancellation before dispatch.
/// `Obsolete` is the "succeeded, but the workspace produced no diff"
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Obsolete,
}

crate::simple_display! {
    RunState {
        Queued => "queued",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Cancelled => "cancelled",
        Obsolete => "obsolete",
    }
}

impl RunState {
    /// Check if this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::Cancelled | RunState::Obsolete
        )
    }

    /// The states a run may be in immediately before entering `self`.
    ///
    /// This is the compare-and-set predicate the ledger enforces on every
    /// transition.
    pub fn allowed_predecessors(&self) -> &'static [RunState] {
        match self {
            // Re-queue is allowed from any terminal state (caller-driven
            // retry); a live Running entry may never regress.
            RunState::Queued => &[
                RunState::Queued,
                RunState::Succeeded,
                RunState::Failed,
                RunState::Cancelled,
                RunState::Obsolete,
            ],
            RunState::Running => &[RunState::Queued],
            RunState::Succeeded | RunState::Failed | RunState::Obsolete => &[RunState::Running],
            RunState::Cancelled => &[RunState::Running, RunState::Queued],
        }
    }

    /// Whether a transition from `from` into `self` is permitted.
    pub fn accepts_from(&self, from: RunState) -> bool {
        self.allowed_predecessors().contains(&from)
    }
}

/// One durable ledger row; survives process restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLedgerEntry {
    pub run_id: RunId,
    pub task_id: TaskId,
    pub state: RunState,
    #[serde(default)]
    pub summary: String,
    /// Serialized result envelope for terminal entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_json: Option<String>,
    /// Serialized [`crate::RunRequest`] as received at dispatch.
    pub request_json: String,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    pub updated_at_ms: u64,
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
