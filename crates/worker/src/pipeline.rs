// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-run pipeline: one straight-line async task from `Running` to
//! a terminal ledger state.
//!
//! Git and container failures are caught here and converted into failed
//! envelopes; they never escape to the RPC caller as transport errors.
//! Cancellation and timeout share one path: the run's token fires, the
//! adapter returns promptly, the container is force-removed, and the
//! envelope reports "Run cancelled or timed out".

use crate::bus::EventBus;
use crate::queue::CANCELLED_SUMMARY;
use ad_adapters::runtime::{AdapterError, EventSink, HarnessRuntimeRouter, RunContext};
use ad_adapters::ContainerRuntime;
use ad_core::{
    Clock, JobEvent, JobEventType, RunEnvelope, RunRequest, RunState, DEFAULT_SCHEMA_VERSION,
};
use ad_engine::{finalize_envelope, prepare_mcp_config, FinalizeContext, Workspaces};
use ad_storage::{LedgerError, RunLedger};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

/// Error detail reported for cancelled or timed-out runs.
pub const CANCELLED_ERROR: &str = "Execution cancelled or exceeded timeout";

/// Everything a run needs, bundled once at startup.
pub struct RunPipeline<C: Clock> {
    ledger: Arc<RunLedger<C>>,
    workspaces: Arc<dyn Workspaces>,
    router: Arc<HarnessRuntimeRouter>,
    containers: Arc<dyn ContainerRuntime>,
    bus: EventBus,
    state_dir: PathBuf,
    default_timeout: Duration,
    clock: C,
}

impl<C: Clock> RunPipeline<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<RunLedger<C>>,
        workspaces: Arc<dyn Workspaces>,
        router: Arc<HarnessRuntimeRouter>,
        containers: Arc<dyn ContainerRuntime>,
        bus: EventBus,
        state_dir: PathBuf,
        default_timeout: Duration,
        clock: C,
    ) -> Self {
        Self { ledger, workspaces, router, containers, bus, state_dir, default_timeout, clock }
    }

    /// Drive one run to a terminal state.
    pub async fn execute(&self, request: RunRequest, cancel: CancellationToken) {
        let span = info_span!("run", run_id = %request.run_id, harness = %request.harness);
        self.execute_inner(request, cancel).instrument(span).await;
    }

    async fn execute_inner(&self, request: RunRequest, cancel: CancellationToken) {
        // Cancelled while still queued: the queue already ledger-marked
        // it, nothing to execute.
        if cancel.is_cancelled() {
            self.complete(
                &request,
                RunState::Cancelled,
                RunEnvelope::failed(CANCELLED_SUMMARY, CANCELLED_ERROR),
                0,
            );
            return;
        }

        match self.ledger.mark_running(&request.run_id) {
            Ok(_) => {}
            Err(e) => {
                // Typically a cancel racing dispatch; the entry is
                // already terminal.
                info!(error = %e, "skipping run that cannot enter Running");
                return;
            }
        }

        // Event fan-out: the sink writes JobEvents, a forwarder moves
        // them onto the bus.
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<JobEvent>();
        let sink = EventSink::new(
            request.run_id.clone(),
            request.structured_protocol_version.clone(),
            event_tx,
        );
        let forward_bus = self.bus.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                forward_bus.publish_job(event);
            }
        });

        let (state, envelope, sequence) = self.run_to_envelope(&request, &sink, &cancel).await;
        drop(sink);
        let _ = forwarder.await;

        self.complete(&request, state, envelope, sequence);
    }

    /// The fallible middle of the pipeline; every error becomes an
    /// envelope.
    async fn run_to_envelope(
        &self,
        request: &RunRequest,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> (RunState, RunEnvelope, u64) {
        let mcp = prepare_mcp_config(request, &self.state_dir.join("runs"));

        let workspace = match self.workspaces.prepare(request).await {
            Ok(workspace) => workspace,
            Err(e) => {
                warn!(error = %e, "workspace preparation failed");
                let mut envelope =
                    RunEnvelope::failed("Workspace preparation failed", e.to_string());
                let decision = self.router.route_request(request);
                finalize_envelope(
                    &mut envelope,
                    &FinalizeContext {
                        runtime_name: decision.primary.name(),
                        runtime_mode: decision.advertised_mode,
                        exit_code: None,
                        mcp: &mcp,
                        workspace_host_path: None,
                        artifact_policy: &request.artifact_policy,
                    },
                );
                return (RunState::Failed, envelope, sink.last_sequence());
            }
        };

        let artifacts_dir = self
            .state_dir
            .join("artifacts")
            .join(request.run_id.normalized().replace(['/', '\\'], "-"));
        let ctx = RunContext {
            workspace_host_path: Some(workspace.workspace_path.clone()),
            artifacts_host_path: Some(artifacts_dir),
        };

        let timeout = request
            .timeout_sec
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(AdapterError::Cancelled),
            _ = tokio::time::sleep(timeout) => {
                // The wall-clock budget trips the same token as an
                // explicit cancel.
                cancel.cancel();
                Err(AdapterError::Cancelled)
            }
            outcome = self.router.execute(request, &ctx, sink, cancel) => outcome,
        };

        let (state, mut envelope, runtime_name, runtime_mode, exit_code) = match outcome {
            Ok(routed) => {
                let exit = routed.result.exit_code;
                (
                    RunState::Running, // refined below from the envelope
                    routed.result.envelope,
                    routed.runtime_name,
                    routed.runtime_mode,
                    exit,
                )
            }
            Err(e) if e.is_cancellation() => {
                let _ = self.containers.kill_by_run_id(&request.run_id, true).await;
                let decision = self.router.route_request(request);
                (
                    RunState::Cancelled,
                    RunEnvelope::failed(CANCELLED_SUMMARY, CANCELLED_ERROR),
                    decision.primary.name(),
                    decision.advertised_mode,
                    None,
                )
            }
            Err(e) => {
                let decision = self.router.route_request(request);
                (
                    RunState::Failed,
                    RunEnvelope::failed("Harness execution crashed", e.to_string()),
                    decision.primary.name(),
                    decision.advertised_mode,
                    None,
                )
            }
        };

        finalize_envelope(
            &mut envelope,
            &FinalizeContext {
                runtime_name,
                runtime_mode,
                exit_code,
                mcp: &mcp,
                workspace_host_path: Some(&workspace.workspace_path),
                artifact_policy: &request.artifact_policy,
            },
        );

        // Runs for every outcome: a non-success envelope only gets the
        // gitWorkflow=skipped stamp, nothing touches the workspace.
        self.workspaces.finalize(request, &workspace, &mut envelope).await;

        if state == RunState::Cancelled {
            return (RunState::Cancelled, envelope, sink.last_sequence());
        }

        let state = if envelope.is_obsolete() {
            RunState::Obsolete
        } else if envelope.is_succeeded() {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        (state, envelope, sink.last_sequence())
    }

    /// Ledger terminal transition plus the final `completed` job event.
    fn complete(
        &self,
        request: &RunRequest,
        state: RunState,
        envelope: RunEnvelope,
        last_sequence: u64,
    ) {
        let payload = serde_json::to_string(&envelope).ok();
        match self.ledger.mark_completed(&request.run_id, state, &envelope.summary, payload.clone())
        {
            Ok(_) => {}
            // A cancel may have beaten us to the terminal transition;
            // the ledger keeps the first writer.
            Err(LedgerError::InvalidTransition { .. }) => {
                info!(state = %state, "terminal transition already applied");
            }
            Err(e) => warn!(error = %e, "terminal ledger write failed"),
        }

        self.bus.publish_job(JobEvent {
            run_id: request.run_id.clone(),
            event_type: JobEventType::Completed,
            summary: envelope.summary.clone(),
            metadata: envelope.metadata.clone(),
            sequence: last_sequence + 1,
            category: "run.completed".to_string(),
            payload_json: payload,
            schema_version: request
                .structured_protocol_version
                .clone()
                .unwrap_or_else(|| DEFAULT_SCHEMA_VERSION.to_string()),
            timestamp_ms: self.clock.epoch_ms(),
        });
        info!(state = %state, summary = %envelope.summary, "run completed");
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
