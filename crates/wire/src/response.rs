// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses and stream frames from a worker.

use ad_core::{JobEvent, WorkerStatus};
use serde::{Deserialize, Serialize};

/// Response (or stream frame) from the worker gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Pong,

    /// Dispatch verdict; `reason` explains a rejection
    Dispatch {
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Cancellation verdict; false for unknown or completed runs
    Cancel { accepted: bool },

    Heartbeat { acknowledged: bool },

    /// Ack for `SubscribeEvents`; stream frames follow
    Subscribed,

    /// One run event on the subscription stream
    Event { event: JobEvent },

    /// One worker status message on the subscription stream
    Status { status: WorkerStatus },

    /// Orphan reconciliation result
    Reconcile {
        orphaned_count: u32,
        removed_containers: Vec<RemovedContainer>,
    },

    /// Shutdown acknowledged
    ShuttingDown,

    /// Protocol-level error
    Error { message: String },
}

/// One container removed by orphan reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemovedContainer {
    pub container_id: String,
    pub run_id: String,
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
