// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn clear_worker_env() {
    for key in [
        "WORKER_STATE_DIR",
        "WORKER_SOCKET",
        "WORKER_WORKSPACES_ROOT",
        "WORKER_ID",
        "WORKER_LOG_DIR",
        "WORKER_MAX_SLOTS",
        "WORKER_RUN_TIMEOUT_SEC",
        "WORKER_RECONCILE_INTERVAL_SEC",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn defaults_hang_off_the_state_dir() {
    clear_worker_env();
    std::env::set_var("WORKER_STATE_DIR", "/tmp/ad-test-state");
    let env = WorkerEnv::from_env();
    assert_eq!(env.state_dir, PathBuf::from("/tmp/ad-test-state"));
    assert_eq!(env.socket_path, PathBuf::from("/tmp/ad-test-state/worker.sock"));
    assert_eq!(env.workspaces_root, PathBuf::from("/tmp/ad-test-state/workspaces"));
    assert_eq!(env.ledger_path(), PathBuf::from("/tmp/ad-test-state/ledger.jsonl"));
    assert_eq!(env.max_slots, 4);
    assert_eq!(env.run_timeout, Duration::from_secs(1800));
    clear_worker_env();
}

#[test]
#[serial]
fn explicit_values_win() {
    clear_worker_env();
    std::env::set_var("WORKER_STATE_DIR", "/tmp/ad-test-state");
    std::env::set_var("WORKER_SOCKET", "/run/ad.sock");
    std::env::set_var("WORKER_ID", "wrk-explicit");
    std::env::set_var("WORKER_MAX_SLOTS", "9");
    std::env::set_var("WORKER_RUN_TIMEOUT_SEC", "120");
    let env = WorkerEnv::from_env();
    assert_eq!(env.socket_path, PathBuf::from("/run/ad.sock"));
    assert_eq!(env.worker_id, WorkerId::new("wrk-explicit"));
    assert_eq!(env.max_slots, 9);
    assert_eq!(env.run_timeout, Duration::from_secs(120));
    clear_worker_env();
}

#[test]
#[serial]
fn malformed_numbers_fall_back_and_slots_have_a_floor() {
    clear_worker_env();
    std::env::set_var("WORKER_STATE_DIR", "/tmp/ad-test-state");
    std::env::set_var("WORKER_MAX_SLOTS", "zero");
    let env = WorkerEnv::from_env();
    assert_eq!(env.max_slots, 4);

    std::env::set_var("WORKER_MAX_SLOTS", "0");
    let env = WorkerEnv::from_env();
    assert_eq!(env.max_slots, 1, "slot floor is one");
    clear_worker_env();
}

#[test]
#[serial]
fn generated_worker_id_when_unset() {
    clear_worker_env();
    std::env::set_var("WORKER_STATE_DIR", "/tmp/ad-test-state");
    let env = WorkerEnv::from_env();
    assert!(env.worker_id.as_str().starts_with("wrk-"));
    clear_worker_env();
}
