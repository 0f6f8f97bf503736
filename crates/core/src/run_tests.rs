// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    queued = { RunState::Queued, false },
    running = { RunState::Running, false },
    succeeded = { RunState::Succeeded, true },
    failed = { RunState::Failed, true },
    cancelled = { RunState::Cancelled, true },
    obsolete = { RunState::Obsolete, true },
)]
fn terminal_states(state: RunState, terminal: bool) {
    assert_eq!(state.is_terminal(), terminal);
}

#[test]
fn running_only_from_queued() {
    assert!(RunState::Running.accepts_from(RunState::Queued));
    assert!(!RunState::Running.accepts_from(RunState::Running));
    assert!(!RunState::Running.accepts_from(RunState::Failed));
    assert!(!RunState::Running.accepts_from(RunState::Succeeded));
}

#[test]
fn terminal_states_only_from_running() {
    for state in [RunState::Succeeded, RunState::Failed, RunState::Obsolete] {
        assert!(state.accepts_from(RunState::Running));
        assert!(!state.accepts_from(RunState::Queued));
        assert!(!state.accepts_from(RunState::Succeeded));
    }
}

#[test]
fn cancelled_also_reachable_from_queued() {
    assert!(RunState::Cancelled.accepts_from(RunState::Queued));
    assert!(RunState::Cancelled.accepts_from(RunState::Running));
    assert!(!RunState::Cancelled.accepts_from(RunState::Failed));
}

#[test]
fn requeue_allowed_only_from_terminal_or_queued() {
    assert!(RunState::Queued.accepts_from(RunState::Queued));
    assert!(RunState::Queued.accepts_from(RunState::Failed));
    assert!(RunState::Queued.accepts_from(RunState::Obsolete));
    assert!(!RunState::Queued.accepts_from(RunState::Running));
}

#[test]
fn no_back_edges_out_of_terminal_states() {
    let terminals =
        [RunState::Succeeded, RunState::Failed, RunState::Cancelled, RunState::Obsolete];
    let live = [RunState::Running, RunState::Succeeded, RunState::Failed, RunState::Cancelled];
    for from in terminals {
        for to in live {
            if to == from {
                continue;
            }
            assert!(!to.accepts_from(from), "{from} -> {to} must be rejected");
        }
    }
}

#[test]
fn state_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&RunState::Succeeded).unwrap(), "\"succeeded\"");
    let back: RunState = serde_json::from_str("\"obsolete\"").unwrap();
    assert_eq!(back, RunState::Obsolete);
}
