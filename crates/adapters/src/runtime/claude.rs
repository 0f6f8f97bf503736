// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude stream-json runtime, plus the zai claude-compatible variant.
//!
//! Claude Code's `--output-format stream-json` emits one JSON object per
//! line: `system` preamble, `assistant` messages whose content blocks
//! carry text / thinking / tool_use, `user` tool results, and a final
//! `result` object. The run's envelope comes from that `result` line; a
//! stream without one routes to the command fallback.

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

/// Claude Code stream-json runtime.
pub struct ClaudeStream {
    executor: Arc<dyn ContainerRuntime>,
    name: &'static str,
    /// Extra environment for provider-compatible variants.
    base_env: Vec<(String, String)>,
}

impl ClaudeStream {
    pub fn new(executor: Arc<dyn ContainerRuntime>) -> Self {
        Self { executor, name: "claude-stream", base_env: Vec::new() }
    }

    fn with_identity(mut self, name: &'static str, base_env: Vec<(String, String)>) -> Self {
        self.name = name;
        self.base_env = base_env;
        self
    }

    /// Translate one stream-json line.
    fn parse_line(line: &str, sink: &EventSink) -> LineOutcome {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            return LineOutcome::Ignored;
        };
        let Some(event_type) = value.get("type").and_then(|t| t.as_str()) else {
            return LineOutcome::Ignored;
        };

        match event_type {
            "assistant" => {
                let blocks = value
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(|c| c.as_array())
                    .cloned()
                    .unwrap_or_default();
                for block in blocks {
                    let kind = match block.get("type").and_then(|t| t.as_str()) {
                        Some("thinking") => RuntimeEventType::ReasoningDelta,
                        Some("tool_use") => RuntimeEventType::CommandDelta,
                        _ => RuntimeEventType::AssistantDelta,
                    };
                    let text = block
                        .get("text")
                        .or_else(|| block.get("thinking"))
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| {
                            let name =
                                block.get("name").and_then(|n| n.as_str()).unwrap_or("tool");
                            let input = block
                                .get("input")
                                .map(|i| i.to_string())
                                .unwrap_or_default();
                            format!("{name} {input}")
                        });
                    sink.emit(kind, text, HashMap::new());
                }
                LineOutcome::Consumed
            }
            "user" => {
                // Tool results flow back as user messages.
                sink.emit(RuntimeEventType::CommandDelta, "tool result received", HashMap::new());
                LineOutcome::Consumed
            }
            "result" => {
                if let Some(usage) = value.get("usage") {
                    sink.emit(RuntimeEventType::UsageUpdated, usage.to_string(), HashMap::new());
                }
                let succeeded =
                    value.get("subtype").and_then(|s| s.as_str()) == Some("success");
                let summary = value
                    .get("result")
                    .and_then(|r| r.as_str())
                    .map(|r| ad_core::short(r, 200).to_string());
                sink.emit(
                    RuntimeEventType::RunCompleted,
                    summary.clone().unwrap_or_else(|| "claude run finished".into()),
                    HashMap::new(),
                );
                let envelope = if succeeded {
                    RunEnvelope::succeeded(summary.unwrap_or_else(|| "Claude run completed".into()))
                } else {
                    let error = value
                        .get("error")
                        .and_then(|e| e.as_str())
                        .unwrap_or("claude reported a non-success result");
                    RunEnvelope::failed(
                        summary.unwrap_or_else(|| "Claude run failed".into()),
                        error,
                    )
                };
                LineOutcome::Completed(envelope)
            }
            other => {
                sink.emit(
                    RuntimeEventType::RunLifecycle,
                    format!("claude {other} event"),
                    HashMap::new(),
                );
                LineOutcome::Consumed
            }
        }
    }
}

#[async_trait]
impl RuntimeAdapter for ClaudeStream {
    fn name(&self) -> &'static str {
        self.name
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
            r#"claude -p "$PROMPT" --output-format stream-json --verbose"#.to_string(),
        ];

        let (envelope, exit_code) = run_harness_container(
            &self.executor,
            request,
            ctx,
            cmd,
            self.base_env.clone(),
            sink,
            cancel,
            &mut Self::parse_line,
        )
        .await?;

        let Some(envelope) = envelope else {
            return Err(AdapterError::IncompleteStream);
        };
        Ok(RuntimeResult { envelope, exit_code: Some(exit_code) })
    }
}

/// Zai's claude-compatible endpoint: the stream-json machinery with the
/// provider base URL and token pointed at zai.
pub struct ZaiClaudeCompatible {
    inner: ClaudeStream,
}

impl ZaiClaudeCompatible {
    pub fn new(executor: Arc<dyn ContainerRuntime>) -> Self {
        let mut base_env =
            vec![("ANTHROPIC_BASE_URL".to_string(), "https://api.z.ai/api/anthropic".to_string())];
        if let Ok(token) = std::env::var("ZAI_API_KEY") {
            if !token.is_empty() {
                base_env.push(("ANTHROPIC_AUTH_TOKEN".to_string(), token));
            }
        }
        Self { inner: ClaudeStream::new(executor).with_identity("zai-claude", base_env) }
    }
}

#[async_trait]
impl RuntimeAdapter for ZaiClaudeCompatible {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn run(
        &self,
        request: &RunRequest,
        ctx: &RunContext,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RuntimeResult, AdapterError> {
        self.inner.run(request, ctx, sink, cancel).await
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
