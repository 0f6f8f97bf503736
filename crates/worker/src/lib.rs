// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ad-worker: the worker daemon (`adworkerd`).
//!
//! Hosts the dispatch queue, the per-run pipeline, the event bus, the
//! gateway RPC listener, and the orphan reconciler.

pub mod bus;
pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod pipeline;
pub mod processor;
pub mod queue;
pub mod reconcile;

pub use bus::EventBus;
pub use env::WorkerEnv;
pub use lifecycle::Daemon;
pub use listener::Gateway;
pub use pipeline::RunPipeline;
pub use processor::JobProcessor;
pub use queue::DispatchQueue;
pub use reconcile::{OrphanReconciler, ReconcileReport};

use ad_storage::LedgerError;
use ad_wire::ProtocolError;
use thiserror::Error;

/// Top-level worker errors.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("another worker instance holds {0}")]
    AlreadyRunning(String),
}
