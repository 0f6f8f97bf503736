// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run MCP configuration handling.
//!
//! The request may carry raw MCP server configuration JSON. It is
//! validated, counted, and materialized to a per-run file so the harness
//! container can mount it; the finalizer stamps the outcome on the
//! envelope.

use ad_core::RunRequest;
use std::path::{Path, PathBuf};

/// Outcome of MCP config preparation for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McpInfo {
    pub present: bool,
    pub valid: bool,
    pub path: Option<PathBuf>,
    /// Number of configured MCP servers to install.
    pub install_action_count: usize,
    pub diagnostics: Vec<String>,
}

/// Validate and materialize the request's MCP config under
/// `{runs_dir}/{run_id}/mcp.json`.
pub fn prepare_mcp_config(request: &RunRequest, runs_dir: &Path) -> McpInfo {
    let Some(raw) = &request.mcp_config_json else {
        return McpInfo::default();
    };

    let mut info = McpInfo { present: true, ..Default::default() };

    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            info.diagnostics.push(format!("mcp config is not valid JSON: {e}"));
            return info;
        }
    };
    info.valid = true;

    let servers = value
        .get("mcpServers")
        .or_else(|| value.get("servers"))
        .and_then(|s| s.as_object());
    match servers {
        Some(map) => info.install_action_count = map.len(),
        None => info.diagnostics.push("no mcpServers object found".to_string()),
    }

    let run_dir = runs_dir.join(ad_core::id::short(&request.run_id.normalized(), 64));
    let path = run_dir.join("mcp.json");
    let write = std::fs::create_dir_all(&run_dir).and_then(|_| {
        let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.clone());
        std::fs::write(&path, pretty)
    });
    match write {
        Ok(()) => info.path = Some(path),
        Err(e) => info.diagnostics.push(format!("failed to write mcp config: {e}")),
    }

    info
}

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod tests;
