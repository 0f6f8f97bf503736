// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenCode SSE runtime.
//!
//! OpenCode reports progress as server-sent events (`data: {json}`
//! frames) with dotted event types (`message.part.updated`,
//! `session.usage`, ...). There is no fallback runtime for OpenCode; a
//! stream without a completion event falls back to the exit status.

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

/// OpenCode server-sent-events runtime.
pub struct OpenCodeSSE {
    executor: Arc<dyn ContainerRuntime>,
}

impl OpenCodeSSE {
    pub fn new(executor: Arc<dyn ContainerRuntime>) -> Self {
        Self { executor }
    }

    /// Translate one SSE frame. Non-`data:` lines are opaque.
    fn parse_line(line: &str, sink: &EventSink) -> LineOutcome {
        let Some(data) = line.strip_prefix("data:").map(str::trim) else {
            return LineOutcome::Ignored;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
            return LineOutcome::Ignored;
        };
        let Some(event_type) = value.get("type").and_then(|t| t.as_str()) else {
            return LineOutcome::Ignored;
        };

        let properties = value.get("properties").unwrap_or(&serde_json::Value::Null);
        let text = properties
            .get("text")
            .or_else(|| properties.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or(data);

        if event_type == "session.completed" || event_type == "session.done" {
            let summary = properties
                .get("summary")
                .and_then(|v| v.as_str())
                .unwrap_or("OpenCode run completed");
            sink.emit(RuntimeEventType::RunCompleted, summary, HashMap::new());
            return LineOutcome::Completed(RunEnvelope::succeeded(summary));
        }

        let kind = if event_type.starts_with("message.part.") {
            RuntimeEventType::AssistantDelta
        } else if event_type == "session.usage" {
            RuntimeEventType::UsageUpdated
        } else if event_type == "session.error" {
            RuntimeEventType::Error
        } else if event_type.starts_with("file.") || event_type.contains("diff") {
            RuntimeEventType::DiffUpdated
        } else {
            RuntimeEventType::RunLifecycle
        };

        sink.emit(kind, text, HashMap::new());
        LineOutcome::Consumed
    }
}

#[async_trait]
impl RuntimeAdapter for OpenCodeSSE {
    fn name(&self) -> &'static str {
        "opencode-sse"
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
            r#"opencode run --format sse "$PROMPT""#.to_string(),
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

        let envelope = envelope.unwrap_or_else(|| {
            if exit_code == 0 {
                RunEnvelope::succeeded("OpenCode run completed")
            } else {
                RunEnvelope::failed(
                    "OpenCode run failed",
                    format!("opencode exited with status {exit_code}"),
                )
            }
        });
        Ok(RuntimeResult { envelope, exit_code: Some(exit_code) })
    }
}

#[cfg(test)]
#[path = "opencode_tests.rs"]
mod tests;
