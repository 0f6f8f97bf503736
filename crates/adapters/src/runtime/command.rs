// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain command runtime.
//!
//! Runs the request's shell command in the container and treats the exit
//! status as the outcome. Wire envelopes in the output stream still
//! become runtime events; everything else is forwarded as log chunks.
//! This is the universal fallback runtime.

use super::{
    run_harness_container, AdapterError, EventSink, LineOutcome, RunContext, RuntimeAdapter,
    RuntimeResult,
};
use crate::container::ContainerRuntime;
use ad_core::{RunEnvelope, RunRequest};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shell-command runtime; the fallback for every structured harness.
pub struct CommandRuntime {
    executor: Arc<dyn ContainerRuntime>,
}

impl CommandRuntime {
    pub fn new(executor: Arc<dyn ContainerRuntime>) -> Self {
        Self { executor }
    }

    /// The command to run: the request's, or a harness-specific default
    /// driving the CLI off `$PROMPT`.
    fn resolve_command(request: &RunRequest) -> Result<String, AdapterError> {
        if !request.command.trim().is_empty() {
            return Ok(request.command.clone());
        }
        let default = match request.harness.trim().to_ascii_lowercase().as_str() {
            "codex" => r#"codex exec --json "$PROMPT""#,
            "claude" | "claude-code" | "claude code" | "zai" => {
                r#"claude -p "$PROMPT" --output-format stream-json --verbose"#
            }
            "opencode" | "open-code" | "open code" => r#"opencode run "$PROMPT""#,
            _ => "",
        };
        if default.is_empty() {
            return Err(AdapterError::Runtime(format!(
                "no command provided for harness '{}'",
                request.harness
            )));
        }
        Ok(default.to_string())
    }
}

#[async_trait]
impl RuntimeAdapter for CommandRuntime {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn run(
        &self,
        request: &RunRequest,
        ctx: &RunContext,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RuntimeResult, AdapterError> {
        let command = Self::resolve_command(request)?;
        let cmd = vec!["bash".to_string(), "-c".to_string(), command];

        let (envelope, exit_code) = run_harness_container(
            &self.executor,
            request,
            ctx,
            cmd,
            Vec::new(),
            sink,
            cancel,
            &mut |_line, _sink| LineOutcome::Ignored,
        )
        .await?;

        let envelope = envelope.unwrap_or_else(|| {
            if exit_code == 0 {
                RunEnvelope::succeeded("Command completed")
            } else {
                RunEnvelope::failed(
                    "Command failed",
                    format!("command exited with status {exit_code}"),
                )
            }
        });

        Ok(RuntimeResult { envelope, exit_code: Some(exit_code) })
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
