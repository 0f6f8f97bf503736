// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan container reconciliation.
//!
//! A container labelled `orchestrator.run-id=X` where X is not in the
//! active set is an orphan: its run crashed, completed elsewhere, or was
//! swept at startup. Orphans are force-removed; a container that
//! disappears mid-sweep is not an error.

use ad_adapters::{ContainerError, ContainerRuntime};
use ad_core::{ContainerId, RunId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of one reconciliation sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub orphans_detected: u32,
    pub removed: Vec<(ContainerId, RunId)>,
}

/// Periodic (and on-demand) orphan reaper.
pub struct OrphanReconciler {
    containers: Arc<dyn ContainerRuntime>,
    orphans_detected_total: AtomicU64,
    orphans_removed_total: AtomicU64,
}

impl OrphanReconciler {
    pub fn new(containers: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            containers,
            orphans_detected_total: AtomicU64::new(0),
            orphans_removed_total: AtomicU64::new(0),
        }
    }

    /// One sweep against the given active set (normalized run ids).
    pub async fn reconcile(
        &self,
        active_run_ids: &HashSet<String>,
    ) -> Result<ReconcileReport, ContainerError> {
        let labelled = self.containers.list_labeled().await?;
        let mut report = ReconcileReport::default();

        for container in labelled {
            if active_run_ids.contains(&container.run_id.normalized()) {
                continue;
            }
            report.orphans_detected += 1;
            match self.containers.remove(&container.container_id).await {
                Ok(()) => {
                    report.removed.push((container.container_id, container.run_id));
                }
                Err(e) => {
                    warn!(
                        container = %container.container_id,
                        run_id = %container.run_id,
                        error = %e,
                        "orphan removal failed"
                    );
                }
            }
        }

        self.orphans_detected_total
            .fetch_add(u64::from(report.orphans_detected), Ordering::Relaxed);
        self.orphans_removed_total
            .fetch_add(report.removed.len() as u64, Ordering::Relaxed);

        if report.orphans_detected > 0 {
            info!(
                orphans_detected = report.orphans_detected,
                orphans_removed = report.removed.len(),
                "reconciled orphaned containers"
            );
        }
        Ok(report)
    }

    /// Lifetime counters `(detected, removed)`.
    pub fn totals(&self) -> (u64, u64) {
        (
            self.orphans_detected_total.load(Ordering::Relaxed),
            self.orphans_removed_total.load(Ordering::Relaxed),
        )
    }

    /// Sweep on a timer until shutdown, with the active set supplied by
    /// the caller.
    pub async fn run_periodic<F>(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
        active_set: F,
    ) where
        F: Fn() -> HashSet<String> + Send + Sync + 'static,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile(&active_set()).await {
                        warn!(error = %e, "reconciliation sweep failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
