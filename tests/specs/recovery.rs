// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-recovery specs: ledger sweep and re-dispatch after restart.

use super::prelude::*;

#[tokio::test]
async fn restart_sweeps_running_and_redispatches_queued() {
    // Seed a ledger the way a crashed worker would have left it: one
    // entry still Running, one still Queued.
    let dir = TempDir::new().expect("tempdir");
    {
        let clock = FakeClock::new();
        let ledger =
            RunLedger::open(&dir.path().join("ledger.jsonl"), clock.clone()).expect("ledger");
        ledger.upsert_queued(&spec_request("run-running")).unwrap();
        ledger.mark_running(&RunId::new("run-running")).unwrap();
        clock.advance(Duration::from_millis(1));
        ledger.upsert_queued(&spec_request("run-queued")).unwrap();
    }

    let adapter = Arc::new(FakeRuntime::succeeding(
        "codex-app-server",
        RunEnvelope::succeeded("recovered and done"),
    ));
    let worker = Worker::start_in(
        dir,
        2,
        FakeWorkspaces::new().with_diff(),
        HarnessRuntimeRouter::uniform(adapter),
    );

    // The Running entry was swept to Failed with the restart summary.
    let swept = worker.ledger.get_snapshot(&RunId::new("run-running")).unwrap();
    assert_eq!(swept.state, RunState::Failed);
    assert_eq!(swept.summary, "task runtime restarted before completion");

    // The Queued entry was re-enqueued and runs to completion.
    assert_eq!(worker.wait_terminal("run-queued").await, RunState::Succeeded);
}

#[tokio::test]
async fn queued_entries_redispatch_in_creation_order() {
    let dir = TempDir::new().expect("tempdir");
    {
        let clock = FakeClock::new();
        let ledger =
            RunLedger::open(&dir.path().join("ledger.jsonl"), clock.clone()).expect("ledger");
        for id in ["run-1", "run-2", "run-3"] {
            ledger.upsert_queued(&spec_request(id)).unwrap();
            clock.advance(Duration::from_millis(1));
        }
    }

    let workspaces = FakeWorkspaces::new();
    let adapter = Arc::new(FakeRuntime::succeeding("fake", RunEnvelope::succeeded("ok")));
    let worker =
        Worker::start_in(dir, 4, workspaces.clone(), HarnessRuntimeRouter::uniform(adapter));

    for id in ["run-1", "run-2", "run-3"] {
        worker.wait_terminal(id).await;
    }
    // prepare order follows creation order.
    assert_eq!(
        workspaces.prepared(),
        vec!["run-1".to_string(), "run-2".to_string(), "run-3".to_string()]
    );
}

#[tokio::test]
async fn a_worker_crash_mid_run_is_recovered_on_the_next_start() {
    let adapter =
        Arc::new(FakeRuntime::new("hang").with_behavior(FakeBehavior::HangUntilCancelled));
    let worker =
        Worker::start(2, FakeWorkspaces::new(), HarnessRuntimeRouter::uniform(adapter));

    worker.dispatch(spec_request("run-crash")).await;
    // Wait until the pipeline has marked it Running.
    for _ in 0..200 {
        if worker
            .ledger
            .get_snapshot(&RunId::new("run-crash"))
            .map(|e| e.state == RunState::Running)
            .unwrap_or(false)
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let dir = worker.crash().await;

    // Restart over the same state dir.
    let adapter = Arc::new(FakeRuntime::succeeding("fake", RunEnvelope::succeeded("ok")));
    let worker =
        Worker::start_in(dir, 2, FakeWorkspaces::new(), HarnessRuntimeRouter::uniform(adapter));

    let entry = worker.ledger.get_snapshot(&RunId::new("run-crash")).unwrap();
    assert_eq!(entry.state, RunState::Failed);
    assert_eq!(entry.summary, "task runtime restarted before completion");
}
