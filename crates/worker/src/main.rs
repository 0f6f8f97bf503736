// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! adworkerd: the AgentsDashboard worker daemon.

use ad_worker::{Daemon, WorkerEnv};
use tracing_subscriber::EnvFilter;

fn init_tracing(env: &WorkerEnv) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &env.log_dir {
        Some(log_dir) => {
            let appender = tracing_appender::rolling::daily(log_dir, "adworkerd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let env = WorkerEnv::from_env();
    let _log_guard = init_tracing(&env);

    let daemon = match Daemon::new(env) {
        Ok(daemon) => daemon,
        Err(e) => {
            eprintln!("adworkerd: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    match daemon.run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "worker exited with error");
            std::process::ExitCode::FAILURE
        }
    }
}
