// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch queue: slot accounting, cancellation registry, and the work
//! handoff channel.
//!
//! Admission is gated by `can_accept()` in the RPC layer; the channel
//! itself is unbounded and never exerts back-pressure. `active` is keyed
//! by the case-folded run id, so dispatch and cancel match ids
//! case-insensitively.

use crate::WorkerError;
use ad_core::{Clock, RunId, RunRequest, RunState};
use ad_storage::{LedgerError, RunLedger};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Summary used for cancellations and timeouts.
pub const CANCELLED_SUMMARY: &str = "Run cancelled or timed out";

/// One admitted job.
#[derive(Clone)]
pub struct ActiveJob {
    pub request: RunRequest,
    pub cancel: CancellationToken,
}

/// Bounded per-worker queue with slot accounting.
pub struct DispatchQueue<C: Clock> {
    ledger: Arc<RunLedger<C>>,
    max_slots: usize,
    active: Mutex<HashMap<String, ActiveJob>>,
    work_tx: mpsc::UnboundedSender<RunRequest>,
    shutdown: CancellationToken,
    accepting: AtomicBool,
}

impl<C: Clock> DispatchQueue<C> {
    /// Build the queue and its consumer channel.
    pub fn new(
        ledger: Arc<RunLedger<C>>,
        max_slots: usize,
        shutdown: CancellationToken,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<RunRequest>) {
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            ledger,
            max_slots,
            active: Mutex::new(HashMap::new()),
            work_tx,
            shutdown,
            accepting: AtomicBool::new(true),
        });
        (queue, work_rx)
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub fn active_slots(&self) -> usize {
        self.active.lock().len()
    }

    /// Normalized ids of every admitted run (for reconciliation).
    pub fn active_run_ids(&self) -> Vec<String> {
        self.active.lock().keys().cloned().collect()
    }

    /// Whether a new dispatch would be admitted right now.
    pub fn can_accept(&self) -> bool {
        self.accepting.load(Ordering::SeqCst) && self.active_slots() < self.max_slots
    }

    /// Refuse further dispatches (shutdown).
    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// Admit a run: ledger first, then the registry, then the channel.
    ///
    /// Re-dispatch of an already-admitted run id is idempotent.
    pub fn enqueue(&self, request: RunRequest) -> Result<(), WorkerError> {
        let key = request.run_id.normalized();
        if self.active.lock().contains_key(&key) {
            info!(run_id = %request.run_id, "run already admitted, dispatch is idempotent");
            return Ok(());
        }

        self.ledger.upsert_queued(&request)?;

        let job =
            ActiveJob { request: request.clone(), cancel: self.shutdown.child_token() };
        self.active.lock().insert(key, job);
        // Receiver outlives the queue; a send failure only happens at
        // teardown.
        let _ = self.work_tx.send(request);
        Ok(())
    }

    /// Cancel a run: signal its token and ledger-mark `Cancelled`.
    ///
    /// Returns whether the run was present. Idempotent: repeat calls on
    /// a completed run return false and change nothing.
    pub fn cancel(&self, run_id: &RunId) -> bool {
        let job = {
            let active = self.active.lock();
            active.get(&run_id.normalized()).cloned()
        };
        let Some(job) = job else {
            return false;
        };

        job.cancel.cancel();

        // A run that never left Queued is finalized here; a Running run's
        // pipeline observes the token and writes the terminal entry
        // (with its envelope payload) itself.
        let still_queued = self
            .ledger
            .get_snapshot(&job.request.run_id)
            .map(|entry| entry.state == RunState::Queued)
            .unwrap_or(false);
        if still_queued {
            match self.ledger.mark_completed(
                &job.request.run_id,
                RunState::Cancelled,
                CANCELLED_SUMMARY,
                None,
            ) {
                Ok(_) => {}
                // The pipeline may have raced us into Running; its
                // cancellation path takes over from there.
                Err(LedgerError::InvalidTransition { .. }) => {}
                Err(e) => warn!(run_id = %run_id, error = %e, "cancel: ledger write failed"),
            }
        }
        info!(run_id = %run_id, "run cancelled");
        true
    }

    /// Look up an admitted job.
    pub fn get(&self, run_id: &RunId) -> Option<ActiveJob> {
        self.active.lock().get(&run_id.normalized()).cloned()
    }

    /// Release a run's slot; idempotent.
    pub fn mark_completed(&self, run_id: &RunId) {
        self.active.lock().remove(&run_id.normalized());
    }

    /// Startup recovery: sweep stale `Running` entries, then re-enqueue
    /// every queued request in creation order.
    pub fn recover(&self) -> Result<usize, WorkerError> {
        let swept = self.ledger.recover_stale_running()?;
        if !swept.is_empty() {
            info!(count = swept.len(), "swept stale running entries to failed");
        }

        let queued = self.ledger.list_queued_requests();
        let count = queued.len();
        for (entry, request) in queued {
            let key = request.run_id.normalized();
            if self.active.lock().contains_key(&key) {
                continue;
            }
            info!(run_id = %entry.run_id, "re-enqueueing recovered run");
            let job =
                ActiveJob { request: request.clone(), cancel: self.shutdown.child_token() };
            self.active.lock().insert(key, job);
            let _ = self.work_tx.send(request);
        }
        Ok(count)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
