// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup wiring, crash recovery, graceful shutdown.
//!
//! Startup: state dir + instance lock, ledger replay, stale-`Running`
//! sweep, re-enqueue of queued runs, then the processor, reconciler, and
//! RPC listener. Shutdown (signal or RPC): refuse new dispatches, give
//! in-flight runs a grace window, then hard-cancel everything.

use crate::bus::EventBus;
use crate::env::{WorkerEnv, SHUTDOWN_GRACE};
use crate::listener::Gateway;
use crate::pipeline::RunPipeline;
use crate::processor::JobProcessor;
use crate::queue::DispatchQueue;
use crate::reconcile::OrphanReconciler;
use crate::WorkerError;
use ad_adapters::{ContainerRuntime, DockerCli, HarnessRuntimeRouter};
use ad_core::SystemClock;
use ad_engine::GitWorkspaceManager;
use ad_storage::RunLedger;
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::File;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The assembled worker daemon.
pub struct Daemon {
    env: WorkerEnv,
    _lock: File,
}

impl Daemon {
    /// Prepare the state directory and take the single-instance lock.
    pub fn new(env: WorkerEnv) -> Result<Self, WorkerError> {
        std::fs::create_dir_all(&env.state_dir)?;
        let lock = File::create(env.lock_path())?;
        if lock.try_lock_exclusive().is_err() {
            return Err(WorkerError::AlreadyRunning(env.lock_path().display().to_string()));
        }
        Ok(Self { env, _lock: lock })
    }

    /// Run until a shutdown signal; returns after the drain completes.
    pub async fn run(self) -> Result<(), WorkerError> {
        let env = self.env.clone();
        info!(
            worker_id = %env.worker_id,
            state_dir = %env.state_dir.display(),
            socket = %env.socket_path.display(),
            max_slots = env.max_slots,
            "worker starting"
        );

        let clock = SystemClock;
        let ledger = Arc::new(RunLedger::open(&env.ledger_path(), clock.clone())?);

        // Soft signal stops intake; the hard token cancels runs.
        let shutdown_signal = CancellationToken::new();
        let hard_cancel = CancellationToken::new();

        let (queue, work_rx) =
            DispatchQueue::new(Arc::clone(&ledger), env.max_slots, hard_cancel.clone());

        let recovered = queue.recover()?;
        if recovered > 0 {
            info!(count = recovered, "re-enqueued recovered runs");
        }

        let containers: Arc<dyn ContainerRuntime> = Arc::new(DockerCli::new());
        let bus = EventBus::new();
        let pipeline = Arc::new(RunPipeline::new(
            Arc::clone(&ledger),
            Arc::new(GitWorkspaceManager::new(env.workspaces_root.clone())),
            Arc::new(HarnessRuntimeRouter::new(Arc::clone(&containers))),
            Arc::clone(&containers),
            bus.clone(),
            env.state_dir.clone(),
            env.run_timeout,
            clock.clone(),
        ));

        let processor = JobProcessor::new(Arc::clone(&queue), pipeline);
        let processor_task = tokio::spawn(processor.run(work_rx));

        let reconciler = Arc::new(OrphanReconciler::new(Arc::clone(&containers)));
        let reconcile_queue = Arc::clone(&queue);
        let reconciler_task = tokio::spawn(Arc::clone(&reconciler).run_periodic(
            env.reconcile_interval,
            hard_cancel.clone(),
            move || -> HashSet<String> { reconcile_queue.active_run_ids().into_iter().collect() },
        ));

        // Replace a stale socket from an unclean exit.
        if env.socket_path.exists() {
            let _ = std::fs::remove_file(&env.socket_path);
        }
        if let Some(parent) = env.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(&env.socket_path)?;
        let gateway = Arc::new(Gateway {
            queue: Arc::clone(&queue),
            bus,
            reconciler,
            worker_id: env.worker_id.clone(),
            shutdown_signal: shutdown_signal.clone(),
            clock,
        });
        let listener_task = tokio::spawn(Arc::clone(&gateway).serve(listener));

        eprintln!("DEBUG: before wait_for_shutdown");
        wait_for_shutdown(&shutdown_signal).await;
        eprintln!("DEBUG: after wait_for_shutdown");
        info!("shutdown signalled, draining");

        queue.stop_accepting();
        eprintln!("DEBUG: before grace");
        let grace = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while queue.active_slots() > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        })
        .await;
        eprintln!("DEBUG: after grace");
        if grace.is_err() {
            warn!(
                in_flight = queue.active_slots(),
                "grace window elapsed, cancelling in-flight runs"
            );
        }
        hard_cancel.cancel();

        eprintln!("DEBUG: before listener_task await");
        let _ = listener_task.await;
        eprintln!("DEBUG: before reconciler_task await");
        let _ = reconciler_task.await;
        eprintln!("DEBUG: before drop queue");
        // The work channel closes when the queue (its only sender) drops.
        drop(queue);
        drop(gateway);
        eprintln!("DEBUG: before processor_task await");
        let _ = processor_task.await;

        eprintln!("DEBUG: before remove_file");
        let _ = std::fs::remove_file(&env.socket_path);
        info!("worker stopped");
        eprintln!("DEBUG: returning Ok");
        Ok(())
    }
}

/// Resolve on SIGINT, SIGTERM, or the RPC shutdown signal.
async fn wait_for_shutdown(signal: &CancellationToken) {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                signal.cancelled().await;
                return;
            }
        };
        tokio::select! {
            _ = signal.cancelled() => {}
            _ = tokio::signal::ctrl_c() => signal.cancel(),
            _ = sigterm.recv() => signal.cancel(),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = signal.cancelled() => {}
            _ = tokio::signal::ctrl_c() => signal.cancel(),
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
