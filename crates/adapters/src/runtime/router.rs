// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime selection and the fallback protocol.
//!
//! Routing is a data-driven registry keyed by normalized harness name
//! plus mode; adding a harness means adding a registry entry and an
//! adapter, not a new class hierarchy. When a structured primary fails
//! with a non-cancellation error and a fallback exists, the router emits
//! a diagnostic event, stamps the fallback metadata, and re-runs the
//! request on the fallback adapter.

use super::{
    AdapterError, ClaudeStream, CodexAppServer, CommandRuntime, EventSink, OpenCodeSSE,
    RunContext, RuntimeAdapter, RuntimeResult, ZaiClaudeCompatible,
};
use crate::container::ContainerRuntime;
use ad_core::{envelope::meta, RunRequest, RuntimeEventType};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The adapters chosen for one run.
#[derive(Clone)]
pub struct RouteDecision {
    pub primary: Arc<dyn RuntimeAdapter>,
    pub fallback: Option<Arc<dyn RuntimeAdapter>>,
    /// Mode advertised to the control plane for this route.
    pub advertised_mode: &'static str,
}

/// A completed routed execution.
#[derive(Debug)]
pub struct RoutedRun {
    pub result: RuntimeResult,
    /// Name of the adapter that actually produced the result.
    pub runtime_name: &'static str,
    pub runtime_mode: &'static str,
}

/// Registry of runtime adapters keyed by (harness, mode).
pub struct HarnessRuntimeRouter {
    command: Arc<dyn RuntimeAdapter>,
    codex: Arc<dyn RuntimeAdapter>,
    opencode: Arc<dyn RuntimeAdapter>,
    claude: Arc<dyn RuntimeAdapter>,
    zai: Arc<dyn RuntimeAdapter>,
}

impl HarnessRuntimeRouter {
    /// Build the standard registry over a container executor.
    pub fn new(executor: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            command: Arc::new(CommandRuntime::new(Arc::clone(&executor))),
            codex: Arc::new(CodexAppServer::new(Arc::clone(&executor))),
            opencode: Arc::new(OpenCodeSSE::new(Arc::clone(&executor))),
            claude: Arc::new(ClaudeStream::new(Arc::clone(&executor))),
            zai: Arc::new(ZaiClaudeCompatible::new(executor)),
        }
    }

    /// Registry with every slot pointing at one adapter (test seam).
    #[cfg(any(test, feature = "test-support"))]
    pub fn uniform(adapter: Arc<dyn RuntimeAdapter>) -> Self {
        Self {
            command: Arc::clone(&adapter),
            codex: Arc::clone(&adapter),
            opencode: Arc::clone(&adapter),
            claude: Arc::clone(&adapter),
            zai: adapter,
        }
    }

    /// Registry with distinct structured and fallback adapters (test seam).
    #[cfg(any(test, feature = "test-support"))]
    pub fn split(
        structured: Arc<dyn RuntimeAdapter>,
        command: Arc<dyn RuntimeAdapter>,
    ) -> Self {
        Self {
            command,
            codex: Arc::clone(&structured),
            opencode: Arc::clone(&structured),
            claude: Arc::clone(&structured),
            zai: structured,
        }
    }

    /// Resolve the route for a (harness, mode) pair.
    pub fn route(&self, harness: &str, mode: &str) -> RouteDecision {
        let harness = normalize_harness(harness);
        let mode = mode.trim().to_ascii_lowercase();

        match harness.as_str() {
            "codex" if mode == "command" => RouteDecision {
                primary: Arc::clone(&self.command),
                fallback: None,
                advertised_mode: "command",
            },
            "codex" => RouteDecision {
                primary: Arc::clone(&self.codex),
                fallback: Some(Arc::clone(&self.command)),
                advertised_mode: "app-server",
            },
            "opencode" => RouteDecision {
                primary: Arc::clone(&self.opencode),
                fallback: None,
                advertised_mode: "sse",
            },
            "claude" => RouteDecision {
                primary: Arc::clone(&self.claude),
                fallback: Some(Arc::clone(&self.command)),
                advertised_mode: "stream-json",
            },
            "zai" => RouteDecision {
                primary: Arc::clone(&self.zai),
                fallback: Some(Arc::clone(&self.command)),
                advertised_mode: "stream-json",
            },
            _ => RouteDecision {
                primary: Arc::clone(&self.command),
                fallback: None,
                advertised_mode: "command",
            },
        }
    }

    /// Route a request, resolving harness and mode from the request with
    /// environment fallbacks.
    pub fn route_request(&self, request: &RunRequest) -> RouteDecision {
        let harness = if request.harness.trim().is_empty() {
            std::env::var("HARNESS").unwrap_or_default()
        } else {
            request.harness.clone()
        };
        self.route(&harness, &resolve_mode(&request.mode))
    }

    /// Execute a request on its route, falling back when permitted.
    pub async fn execute(
        &self,
        request: &RunRequest,
        ctx: &RunContext,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RoutedRun, AdapterError> {
        let decision = self.route_request(request);
        let primary_name = decision.primary.name();
        info!(
            run_id = %request.run_id,
            runtime = primary_name,
            mode = decision.advertised_mode,
            "runtime selected"
        );

        match decision.primary.run(request, ctx, sink, cancel).await {
            Ok(result) => Ok(RoutedRun {
                result,
                runtime_name: primary_name,
                runtime_mode: decision.advertised_mode,
            }),
            Err(e) if !e.is_cancellation() => {
                let Some(fallback) = decision.fallback else {
                    return Err(e);
                };
                let failure = e.to_string();
                warn!(
                    run_id = %request.run_id,
                    primary = primary_name,
                    error = %failure,
                    "structured runtime failed, running command fallback"
                );
                sink.emit(
                    RuntimeEventType::Diagnostic,
                    format!("Structured runtime '{primary_name}' failed: {failure}"),
                    HashMap::new(),
                );

                let mut routed = fallback.run(request, ctx, sink, cancel).await?;
                routed.envelope.stamp(meta::STRUCTURED_RUNTIME_FALLBACK, "true");
                routed.envelope.stamp(meta::STRUCTURED_RUNTIME_FAILURE, failure);
                Ok(RoutedRun {
                    result: routed,
                    runtime_name: fallback.name(),
                    runtime_mode: "command",
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Fold harness aliases down to their registry key.
fn normalize_harness(harness: &str) -> String {
    let folded = harness.trim().to_ascii_lowercase();
    match folded.as_str() {
        "open-code" | "open code" => "opencode".to_string(),
        "claude-code" | "claude code" => "claude".to_string(),
        _ => folded,
    }
}

/// Mode precedence: request value, then the harness mode env overrides.
fn resolve_mode(request_mode: &str) -> String {
    if !request_mode.trim().is_empty() {
        return request_mode.trim().to_string();
    }
    for key in ["HARNESS_MODE", "HARNESS_RUNTIME_MODE", "HARNESS_EXECUTION_MODE"] {
        if let Ok(mode) = std::env::var(key) {
            if !mode.trim().is_empty() {
                return mode.trim().to_string();
            }
        }
    }
    String::new()
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
