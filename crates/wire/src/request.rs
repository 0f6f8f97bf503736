// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests from the control plane to a worker.

use ad_core::{RunRequest, WorkerId};
use serde::{Deserialize, Serialize};

/// Request from the control plane to the worker gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Dispatch one run to this worker
    Dispatch { request: RunRequest },

    /// Cancel a queued or running run (case-insensitive id match)
    Cancel { run_id: String },

    /// Worker heartbeat relay
    Heartbeat {
        worker_id: WorkerId,
        active_slots: u32,
        max_slots: u32,
    },

    /// Subscribe to the run event stream; the reply is a `Subscribed`
    /// ack followed by `Event`/`Status` frames until disconnect
    SubscribeEvents,

    /// Reap containers whose run id is not in the active set
    ReconcileOrphans { active_run_ids: Vec<String> },

    /// Request worker shutdown
    Shutdown,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
