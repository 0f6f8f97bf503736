// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ad_core::WorkerId;
use std::path::PathBuf;
use tempfile::TempDir;

fn env_for(dir: &TempDir) -> WorkerEnv {
    WorkerEnv {
        worker_id: WorkerId::new("wrk-test"),
        state_dir: dir.path().to_path_buf(),
        socket_path: dir.path().join("worker.sock"),
        workspaces_root: dir.path().join("workspaces"),
        log_dir: None,
        max_slots: 2,
        run_timeout: std::time::Duration::from_secs(5),
        reconcile_interval: std::time::Duration::from_secs(3600),
    }
}

#[test]
fn second_instance_is_refused_by_the_lock() {
    let dir = TempDir::new().unwrap();
    let first = Daemon::new(env_for(&dir)).unwrap();
    let second = Daemon::new(env_for(&dir));
    assert!(matches!(second, Err(WorkerError::AlreadyRunning(_))));
    drop(first);

    // Lock released with the instance.
    assert!(Daemon::new(env_for(&dir)).is_ok());
}

#[test]
fn new_creates_the_state_dir() {
    let dir = TempDir::new().unwrap();
    let mut env = env_for(&dir);
    env.state_dir = dir.path().join("nested/state");
    let daemon = Daemon::new(env.clone());
    assert!(daemon.is_ok());
    assert!(PathBuf::from(&env.state_dir).is_dir());
}

#[tokio::test]
async fn daemon_serves_rpc_and_shuts_down_cleanly() {
    let dir = TempDir::new().unwrap();
    let env = env_for(&dir);
    let socket_path = env.socket_path.clone();
    let daemon = Daemon::new(env).unwrap();
    let run = tokio::spawn(daemon.run());

    // Wait for the socket to appear.
    for _ in 0..100 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let mut client = tokio::net::UnixStream::connect(&socket_path).await.unwrap();
    ad_wire::write_message(&mut client, &ad_wire::Request::Ping).await.unwrap();
    let response: Option<ad_wire::Response> = ad_wire::read_message(&mut client).await.unwrap();
    assert_eq!(response, Some(ad_wire::Response::Pong));

    ad_wire::write_message(&mut client, &ad_wire::Request::Shutdown).await.unwrap();
    let response: Option<ad_wire::Response> = ad_wire::read_message(&mut client).await.unwrap();
    assert_eq!(response, Some(ad_wire::Response::ShuttingDown));

    run.await.unwrap().unwrap();
    assert!(!socket_path.exists(), "socket file is cleaned up");
}
