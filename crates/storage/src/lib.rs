// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ad-storage: durable run ledger for the AgentsDashboard worker.

mod ledger;

pub use ledger::{LedgerError, RunLedger, STALE_RUNNING_SUMMARY};
