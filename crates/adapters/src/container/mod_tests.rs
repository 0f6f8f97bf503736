// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ad_core::RunId;

#[tokio::test]
async fn fake_runtime_tracks_create_and_remove() {
    let runtime = FakeContainerRuntime::new();
    let spec = ContainerSpec {
        image: "img".into(),
        cmd: vec![],
        env: vec![],
        labels: Default::default(),
        run_id: RunId::new("run-A"),
        task_id: "t".into(),
        repo_id: "r".into(),
        workspace_host_path: None,
        artifacts_host_path: None,
        sandbox: Default::default(),
    };
    let id = runtime.create(&spec).await.unwrap();
    assert_eq!(runtime.list_labeled().await.unwrap().len(), 1);

    runtime.remove(&id).await.unwrap();
    assert!(runtime.list_labeled().await.unwrap().is_empty());
    assert_eq!(runtime.removed(), vec![id]);
}

#[tokio::test]
async fn fake_kill_by_run_id_matches_case_insensitively() {
    let runtime = FakeContainerRuntime::new();
    let spec = ContainerSpec {
        image: "img".into(),
        cmd: vec![],
        env: vec![],
        labels: Default::default(),
        run_id: RunId::new("Run-A"),
        task_id: "t".into(),
        repo_id: "r".into(),
        workspace_host_path: None,
        artifacts_host_path: None,
        sandbox: Default::default(),
    };
    runtime.create(&spec).await.unwrap();
    let killed = runtime.kill_by_run_id(&RunId::new("run-a"), true).await.unwrap();
    assert_eq!(killed.len(), 1);
    assert!(runtime.list_labeled().await.unwrap().is_empty());
}

#[test]
fn label_mismatch_error_names_both_ids() {
    let err = ContainerError::LabelMismatch {
        container: "abc".into(),
        expected: "run-A".into(),
        actual: "run-B".into(),
    };
    let msg = err.to_string();
    assert!(msg.contains("run-A") && msg.contains("run-B"));
}
