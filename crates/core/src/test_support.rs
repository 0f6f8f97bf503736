// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers and proptest strategies for other crates' tests.

use crate::run::RunState;
use proptest::prelude::*;

/// Strategy yielding any run state.
pub fn any_run_state() -> impl Strategy<Value = RunState> {
    prop_oneof![
        Just(RunState::Queued),
        Just(RunState::Running),
        Just(RunState::Succeeded),
        Just(RunState::Failed),
        Just(RunState::Cancelled),
        Just(RunState::Obsolete),
    ]
}

/// Strategy yielding only terminal states.
pub fn terminal_run_state() -> impl Strategy<Value = RunState> {
    prop_oneof![
        Just(RunState::Succeeded),
        Just(RunState::Failed),
        Just(RunState::Cancelled),
        Just(RunState::Obsolete),
    ]
}

/// Strategy yielding plausible run id strings, mixed case.
pub fn run_id_string() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9-]{0,16}"
}
