// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness runtime adapters.
//!
//! An adapter executes one agent invocation inside a container and
//! translates the harness's native output (app-server JSON lines, SSE
//! frames, stream-json, plain text) into typed runtime events via the
//! [`EventSink`]. The sink owns the per-run sequence; its numbering is
//! canonical, and wire envelopes arriving out of order are dropped.

mod claude;
mod codex;
mod command;
mod opencode;
mod router;

pub use claude::{ClaudeStream, ZaiClaudeCompatible};
pub use codex::CodexAppServer;
pub use command::CommandRuntime;
pub use opencode::OpenCodeSSE;
pub use router::{HarnessRuntimeRouter, RouteDecision, RoutedRun};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBehavior, FakeRuntime, FakeRuntimeCall};

use crate::container::{ContainerError, ContainerRuntime, ContainerSpec};
use ad_core::{
    parse_wire_event, project, EnvelopeStatus, JobEvent, JobEventType, RunEnvelope, RunRequest,
    RuntimeEventType, WireEvent,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Errors from runtime adapter execution.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("execution cancelled")]
    Cancelled,
    #[error("container error: {0}")]
    Container(#[from] ContainerError),
    #[error("structured stream ended without a completion event")]
    IncompleteStream,
    #[error("harness runtime error: {0}")]
    Runtime(String),
}

impl AdapterError {
    /// Cancellation is never retried or routed to a fallback.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AdapterError::Cancelled)
    }
}

/// Host paths bound into the run container.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub workspace_host_path: Option<PathBuf>,
    pub artifacts_host_path: Option<PathBuf>,
}

/// Outcome of one adapter invocation.
#[derive(Debug, Clone)]
pub struct RuntimeResult {
    pub envelope: RunEnvelope,
    pub exit_code: Option<i64>,
}

/// Executes one agent invocation; emits events via the sink.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Adapter id, stamped as `runtimeName` on finalized envelopes.
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        request: &RunRequest,
        ctx: &RunContext,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RuntimeResult, AdapterError>;
}

/// Single-producer, ordered event sink for one run.
///
/// Assigns the monotonic per-run `sequence` (starting at 1) and fans the
/// projected [`JobEvent`] out to the worker's subscription stream.
pub struct EventSink {
    run_id: ad_core::RunId,
    protocol_version: Option<String>,
    tx: mpsc::UnboundedSender<JobEvent>,
    /// Last assigned sink sequence; the canonical numbering.
    seq: AtomicU64,
    /// Highest wire-envelope sequence accepted so far.
    last_wire_seq: AtomicU64,
}

impl EventSink {
    pub fn new(
        run_id: ad_core::RunId,
        protocol_version: Option<String>,
        tx: mpsc::UnboundedSender<JobEvent>,
    ) -> Self {
        Self { run_id, protocol_version, tx, seq: AtomicU64::new(0), last_wire_seq: AtomicU64::new(0) }
    }

    /// Emit a typed runtime event. Returns the assigned sequence.
    pub fn emit(
        &self,
        event_type: RuntimeEventType,
        content: impl Into<String>,
        metadata: HashMap<String, String>,
    ) -> u64 {
        let content = content.into();
        self.send(event_type.wire_str(), &content, metadata)
    }

    /// Forward a wire envelope parsed out of the container log stream.
    ///
    /// The sink's own numbering is canonical; a wire sequence that is not
    /// strictly greater than the last accepted one is dropped.
    pub fn forward_wire(&self, wire: &WireEvent) -> Option<u64> {
        let last = self.last_wire_seq.load(Ordering::SeqCst);
        if wire.sequence <= last {
            warn!(
                run_id = %self.run_id,
                wire_sequence = wire.sequence,
                last_accepted = last,
                "dropping out-of-order wire event"
            );
            return None;
        }
        self.last_wire_seq.store(wire.sequence, Ordering::SeqCst);
        Some(self.send(&wire.event_type, &wire.content, wire.metadata.clone()))
    }

    /// Forward an opaque log chunk verbatim (no sequence consumed).
    pub fn log_chunk(&self, chunk: &str) {
        let event = JobEvent {
            run_id: self.run_id.clone(),
            event_type: JobEventType::LogChunk,
            summary: chunk.to_string(),
            metadata: HashMap::new(),
            sequence: 0,
            category: String::new(),
            payload_json: None,
            schema_version: String::new(),
            timestamp_ms: epoch_ms(),
        };
        let _ = self.tx.send(event);
    }

    /// Last sequence assigned by this sink.
    pub fn last_sequence(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    fn send(&self, type_str: &str, content: &str, metadata: HashMap<String, String>) -> u64 {
        let sequence = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let projection = project(type_str, content, self.protocol_version.as_deref());
        let event = JobEvent {
            run_id: self.run_id.clone(),
            event_type: JobEventType::Log,
            summary: content.to_string(),
            metadata,
            sequence,
            category: projection.category,
            payload_json: projection.payload_json,
            schema_version: projection.schema_version,
            timestamp_ms: epoch_ms(),
        };
        let _ = self.tx.send(event);
        sequence
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Reassembles complete lines from arbitrarily-chunked stream output.
#[derive(Default)]
pub(crate) struct LineAssembler {
    partial: String,
}

impl LineAssembler {
    /// Push a chunk, yielding every complete line it closes.
    pub(crate) fn push(&mut self, chunk: &str) -> Vec<String> {
        self.partial.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Drain whatever is left at end of stream.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = self.partial.trim();
        if rest.is_empty() {
            None
        } else {
            let line = rest.to_string();
            self.partial.clear();
            Some(line)
        }
    }
}

/// What an adapter's line parser did with a native output line.
pub(crate) enum LineOutcome {
    /// Translated into sink events (or deliberately swallowed).
    Consumed,
    /// Not structured output; forward as a raw log chunk.
    Ignored,
    /// Carried the run's completion envelope.
    Completed(RunEnvelope),
}

/// Build the run's completion envelope out of a `completion` event.
///
/// The content may be a full envelope object; otherwise the status is
/// pulled from the event metadata.
pub(crate) fn envelope_from_completion(
    content: &str,
    metadata: &HashMap<String, String>,
) -> RunEnvelope {
    if let Ok(envelope) = serde_json::from_str::<RunEnvelope>(content) {
        if envelope.status.is_some() {
            return envelope;
        }
    }

    let status = match metadata.get("status").map(String::as_str) {
        Some("succeeded") => Some(EnvelopeStatus::Succeeded),
        Some("failed") => Some(EnvelopeStatus::Failed),
        Some("unknown") => Some(EnvelopeStatus::Unknown),
        _ => None,
    };
    RunEnvelope {
        status,
        summary: metadata
            .get("summary")
            .cloned()
            .unwrap_or_else(|| ad_core::short(content, 200).to_string()),
        ..Default::default()
    }
}

/// Shared harness-in-container execution loop.
///
/// Creates and starts the container, streams its merged output, routes
/// wire envelopes through the sink, hands native lines to `on_line`, and
/// returns the completion envelope (if any) together with the exit
/// status. On cancellation the container is force-removed and
/// [`AdapterError::Cancelled`] is returned.
pub(crate) async fn run_harness_container(
    executor: &Arc<dyn ContainerRuntime>,
    request: &RunRequest,
    ctx: &RunContext,
    cmd: Vec<String>,
    extra_env: Vec<(String, String)>,
    sink: &EventSink,
    cancel: &CancellationToken,
    on_line: &mut (dyn FnMut(&str, &EventSink) -> LineOutcome + Send),
) -> Result<(Option<RunEnvelope>, i64), AdapterError> {
    let mut env: Vec<(String, String)> =
        request.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    env.sort();
    let prompt = if request.prompt.is_empty() {
        std::env::var("PROMPT").unwrap_or_default()
    } else {
        request.prompt.clone()
    };
    if !prompt.is_empty() {
        env.push(("PROMPT".to_string(), prompt));
    }
    env.extend(extra_env);

    let spec = ContainerSpec {
        image: request.image().to_string(),
        cmd,
        env,
        labels: request.container_labels.clone(),
        run_id: request.run_id.clone(),
        task_id: request.task_id.to_string(),
        repo_id: request.repository_id.to_string(),
        workspace_host_path: ctx.workspace_host_path.clone(),
        artifacts_host_path: ctx.artifacts_host_path.clone(),
        sandbox: request.sandbox.clone(),
    };

    let container_id = executor.create(&spec).await?;
    executor.start(&container_id).await?;

    let (tx, mut rx) = mpsc::channel::<String>(16);
    let logs_executor = Arc::clone(executor);
    let logs_container = container_id.clone();
    let logs_run_id = request.run_id.clone();
    let logs_cancel = cancel.child_token();
    let logs_task = tokio::spawn(async move {
        logs_executor.stream_logs(&logs_container, &logs_run_id, tx, logs_cancel).await
    });

    let mut assembler = LineAssembler::default();
    let mut envelope: Option<RunEnvelope> = None;

    let stream_result: Result<(), AdapterError> = async {
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(AdapterError::Cancelled),
                chunk = rx.recv() => chunk,
            };
            let Some(chunk) = chunk else { break };
            for line in assembler.push(&chunk) {
                handle_line(&line, sink, on_line, &mut envelope);
            }
        }
        if let Some(line) = assembler.finish() {
            handle_line(&line, sink, on_line, &mut envelope);
        }
        Ok(())
    }
    .await;

    if let Err(e) = stream_result {
        let _ = executor.kill_by_run_id(&request.run_id, true).await;
        let _ = logs_task.await;
        return Err(e);
    }
    let _ = logs_task.await;

    let exit_code = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = executor.kill_by_run_id(&request.run_id, true).await;
            return Err(AdapterError::Cancelled);
        }
        code = executor.wait(&container_id) => code?,
    };

    // Auto-remove usually handles this; force-remove covers the rest.
    let _ = executor.remove(&container_id).await;

    Ok((envelope, exit_code))
}

fn handle_line(
    line: &str,
    sink: &EventSink,
    on_line: &mut (dyn FnMut(&str, &EventSink) -> LineOutcome + Send),
    envelope: &mut Option<RunEnvelope>,
) {
    if let Some(wire) = parse_wire_event(line) {
        if sink.forward_wire(&wire).is_some() && wire.event_type == "completion" {
            *envelope = Some(envelope_from_completion(&wire.content, &wire.metadata));
        }
        return;
    }
    match on_line(line, sink) {
        LineOutcome::Consumed => {}
        LineOutcome::Ignored => sink.log_chunk(line),
        LineOutcome::Completed(done) => *envelope = Some(done),
    }
}
