// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ad_adapters::container::OrchestratorContainer;
use ad_adapters::FakeContainerRuntime;

fn container(id: &str, run_id: &str) -> OrchestratorContainer {
    OrchestratorContainer {
        container_id: ContainerId::new(id),
        run_id: RunId::new(run_id),
        task_id: "task".into(),
        repo_id: "repo".into(),
        state: "running".into(),
        image: "img".into(),
        created_at: String::new(),
    }
}

#[tokio::test]
async fn removes_containers_outside_the_active_set() {
    let containers = Arc::new(FakeContainerRuntime::new());
    containers.add_labeled(container("c1", "run-live"));
    containers.add_labeled(container("c2", "run-dead"));
    let reconciler = OrphanReconciler::new(containers.clone());

    let active: HashSet<String> = ["run-live".to_string()].into();
    let report = reconciler.reconcile(&active).await.unwrap();

    assert_eq!(report.orphans_detected, 1);
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].1, RunId::new("run-dead"));
    assert_eq!(containers.live().len(), 1);
    assert_eq!(reconciler.totals(), (1, 1));
}

#[tokio::test]
async fn active_set_matches_case_insensitively() {
    let containers = Arc::new(FakeContainerRuntime::new());
    containers.add_labeled(container("c1", "Run-A"));
    let reconciler = OrphanReconciler::new(containers.clone());

    let active: HashSet<String> = ["run-a".to_string()].into();
    let report = reconciler.reconcile(&active).await.unwrap();
    assert_eq!(report.orphans_detected, 0);
    assert_eq!(containers.live().len(), 1);
}

#[tokio::test]
async fn empty_world_is_a_clean_sweep() {
    let containers = Arc::new(FakeContainerRuntime::new());
    let reconciler = OrphanReconciler::new(containers);
    let report = reconciler.reconcile(&HashSet::new()).await.unwrap();
    assert_eq!(report, ReconcileReport::default());
}

#[tokio::test]
async fn periodic_sweep_stops_on_shutdown() {
    let containers = Arc::new(FakeContainerRuntime::new());
    containers.add_labeled(container("c1", "run-dead"));
    let reconciler = Arc::new(OrphanReconciler::new(containers.clone()));
    let shutdown = CancellationToken::new();

    let task = tokio::spawn(Arc::clone(&reconciler).run_periodic(
        Duration::from_millis(10),
        shutdown.clone(),
        HashSet::new,
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();
    task.await.unwrap();

    assert!(containers.live().is_empty());
    assert!(reconciler.totals().0 >= 1);
}
