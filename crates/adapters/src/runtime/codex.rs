// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex app-server runtime.
//!
//! Drives the codex CLI in structured mode and translates its JSON event
//! lines. The stream must end in a completion event; a stream that dries
//! up without one is an adapter error, which routes the run to the
//! command fallback.

use super::{
    run_harness_container, AdapterError, EventSink, LineOutcome, RunContext, RuntimeAdapter,
    RuntimeResult,
};
use crate::container::ContainerRuntime;
use ad_core::{RunEnvelope, RunRequest, RuntimeEventType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Structured codex app-server runtime.
pub struct CodexAppServer {
    executor: Arc<dyn ContainerRuntime>,
}

impl CodexAppServer {
    pub fn new(executor: Arc<dyn ContainerRuntime>) -> Self {
        Self { executor }
    }

    /// Translate one codex JSON event line.
    fn parse_line(line: &str, sink: &EventSink) -> LineOutcome {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            return LineOutcome::Ignored;
        };
        let Some(event_type) = value.get("type").and_then(|t| t.as_str()) else {
            return LineOutcome::Ignored;
        };

        // Fall back to the bare event type rather than the raw JSON line;
        // embedded-JSON projection would otherwise reclassify the event.
        let text = value
            .get("delta")
            .or_else(|| value.get("text"))
            .or_else(|| value.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or(event_type);

        let kind = if event_type.contains("reasoning") {
            RuntimeEventType::ReasoningDelta
        } else if event_type.contains("agent_message") || event_type.contains("assistant") {
            RuntimeEventType::AssistantDelta
        } else if event_type.contains("exec_command") || event_type.contains("command") {
            RuntimeEventType::CommandDelta
        } else if event_type.contains("diff") {
            RuntimeEventType::DiffUpdated
        } else if event_type.contains("token_count") || event_type.contains("usage") {
            RuntimeEventType::UsageUpdated
        } else if event_type.contains("error") {
            RuntimeEventType::Error
        } else if event_type.contains("task_complete") || event_type.contains("completion") {
            let summary = value
                .get("last_agent_message")
                .and_then(|v| v.as_str())
                .unwrap_or("Codex run completed");
            sink.emit(RuntimeEventType::RunCompleted, summary, HashMap::new());
            return LineOutcome::Completed(RunEnvelope::succeeded(summary));
        } else {
            RuntimeEventType::RunLifecycle
        };

        sink.emit(kind, text, HashMap::new());
        LineOutcome::Consumed
    }
}

#[async_trait]
impl RuntimeAdapter for CodexAppServer {
    fn name(&self) -> &'static str {
        "codex-app-server"
    }

    async fn run(
        &self,
        request: &RunRequest,
        ctx: &RunContext,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RuntimeResult, AdapterError> {
        let cmd = vec![
            "bash".to_string(),
            "-c".to_string(),
            r#"codex exec --json "$PROMPT""#.to_string(),
        ];

        let (envelope, exit_code) = run_harness_container(
            &self.executor,
            request,
            ctx,
            cmd,
            Vec::new(),
            sink,
            cancel,
            &mut Self::parse_line,
        )
        .await?;

        let Some(mut envelope) = envelope else {
            return Err(AdapterError::IncompleteStream);
        };
        if exit_code != 0 && envelope.is_succeeded() {
            envelope = RunEnvelope::failed(
                "Codex run failed",
                format!("codex exited with status {exit_code}"),
            );
        }
        Ok(RuntimeResult { envelope, exit_code: Some(exit_code) })
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
