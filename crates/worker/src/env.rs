// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker configuration, resolved once from the environment at startup.

use ad_core::WorkerId;
use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock budget per run (30 minutes).
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(1800);

/// Default reconciliation interval.
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Default slot count.
const DEFAULT_MAX_SLOTS: usize = 4;

/// Grace window for in-flight runs on shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Resolved worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerEnv {
    pub worker_id: WorkerId,
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub workspaces_root: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub max_slots: usize,
    pub run_timeout: Duration,
    pub reconcile_interval: Duration,
}

impl WorkerEnv {
    /// Resolve from process environment with sensible defaults.
    pub fn from_env() -> Self {
        let state_dir = std::env::var("WORKER_STATE_DIR")
            .map(PathBuf::from)
            .ok()
            .unwrap_or_else(default_state_dir);

        let socket_path = std::env::var("WORKER_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|_| state_dir.join("worker.sock"));

        let workspaces_root = std::env::var("WORKER_WORKSPACES_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| state_dir.join("workspaces"));

        let worker_id = std::env::var("WORKER_ID")
            .ok()
            .filter(|id| !id.trim().is_empty())
            .map(WorkerId::new)
            .unwrap_or_else(WorkerId::generate);

        Self {
            worker_id,
            socket_path,
            workspaces_root,
            log_dir: std::env::var("WORKER_LOG_DIR").map(PathBuf::from).ok(),
            max_slots: parse_env("WORKER_MAX_SLOTS", DEFAULT_MAX_SLOTS).max(1),
            run_timeout: Duration::from_secs(parse_env(
                "WORKER_RUN_TIMEOUT_SEC",
                DEFAULT_RUN_TIMEOUT.as_secs(),
            )),
            reconcile_interval: Duration::from_secs(parse_env(
                "WORKER_RECONCILE_INTERVAL_SEC",
                DEFAULT_RECONCILE_INTERVAL.as_secs(),
            )),
            state_dir,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir.join("ledger.jsonl")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("worker.lock")
    }
}

fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("agentsdashboard")
}

fn parse_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
