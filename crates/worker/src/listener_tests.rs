// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ad_adapters::FakeContainerRuntime;
use ad_core::{FakeClock, JobEvent, JobEventType, RunRequest};
use ad_storage::RunLedger;
use tempfile::TempDir;
use tokio::sync::mpsc;

struct Fixture {
    _dir: TempDir,
    gateway: Arc<Gateway<FakeClock>>,
    work_rx: mpsc::UnboundedReceiver<RunRequest>,
}

fn fixture(max_slots: usize) -> Fixture {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::new();
    let ledger =
        Arc::new(RunLedger::open(&dir.path().join("ledger.jsonl"), clock.clone()).unwrap());
    let (queue, work_rx) = DispatchQueue::new(ledger, max_slots, CancellationToken::new());
    let gateway = Arc::new(Gateway {
        queue,
        bus: EventBus::new(),
        reconciler: Arc::new(OrphanReconciler::new(Arc::new(FakeContainerRuntime::new()))),
        worker_id: WorkerId::new("wrk-test"),
        shutdown_signal: CancellationToken::new(),
        clock,
    });
    Fixture { _dir: dir, gateway, work_rx }
}

fn dispatch(run_id: &str) -> Request {
    Request::Dispatch { request: RunRequest::builder().run_id(run_id).build() }
}

#[tokio::test]
async fn ping_pongs() {
    let fx = fixture(4);
    assert_eq!(fx.gateway.handle(Request::Ping).await, Response::Pong);
}

#[tokio::test]
async fn blank_run_id_is_rejected_with_reason() {
    let fx = fixture(4);
    let response = fx.gateway.handle(dispatch("  ")).await;
    assert_eq!(
        response,
        Response::Dispatch { accepted: false, reason: Some("run_id is required".to_string()) }
    );
}

#[tokio::test]
async fn capacity_rejection_names_the_reason() {
    let mut fx = fixture(1);
    assert_eq!(
        fx.gateway.handle(dispatch("run-X")).await,
        Response::Dispatch { accepted: true, reason: None }
    );
    let response = fx.gateway.handle(dispatch("run-Y")).await;
    assert_eq!(
        response,
        Response::Dispatch { accepted: false, reason: Some("worker at capacity".to_string()) }
    );
    // Only the admitted run reached the work channel.
    assert_eq!(fx.work_rx.try_recv().unwrap().run_id, "run-X");
    assert!(fx.work_rx.try_recv().is_err());
}

#[tokio::test]
async fn cancel_unknown_run_is_not_accepted() {
    let fx = fixture(4);
    let response = fx.gateway.handle(Request::Cancel { run_id: "ghost".into() }).await;
    assert_eq!(response, Response::Cancel { accepted: false });
}

#[tokio::test]
async fn cancel_matches_case_insensitively() {
    let fx = fixture(4);
    fx.gateway.handle(dispatch("Run-C")).await;
    let response = fx.gateway.handle(Request::Cancel { run_id: "run-c".into() }).await;
    assert_eq!(response, Response::Cancel { accepted: true });
}

#[tokio::test]
async fn heartbeat_publishes_worker_status() {
    let fx = fixture(4);
    let mut rx = fx.gateway.bus.subscribe();
    let response = fx
        .gateway
        .handle(Request::Heartbeat {
            worker_id: WorkerId::new("wrk-9"),
            active_slots: 1,
            max_slots: 4,
        })
        .await;
    assert_eq!(response, Response::Heartbeat { acknowledged: true });

    let BusMessage::Worker(status) = rx.recv().await.unwrap() else {
        panic!("expected worker status");
    };
    assert_eq!(status.worker_id, WorkerId::new("wrk-9"));
    assert_eq!(status.active_slots, 1);
}

#[tokio::test]
async fn reconcile_reports_removed_containers() {
    let fx = fixture(4);
    let containers = Arc::new(FakeContainerRuntime::new());
    containers.add_labeled(ad_adapters::container::OrchestratorContainer {
        container_id: ad_core::ContainerId::new("c9"),
        run_id: RunId::new("run-dead"),
        task_id: "t".into(),
        repo_id: "r".into(),
        state: "exited".into(),
        image: "img".into(),
        created_at: String::new(),
    });
    let gateway = Arc::new(Gateway {
        reconciler: Arc::new(OrphanReconciler::new(containers)),
        queue: Arc::clone(&fx.gateway.queue),
        bus: fx.gateway.bus.clone(),
        worker_id: WorkerId::new("wrk-test"),
        shutdown_signal: CancellationToken::new(),
        clock: FakeClock::new(),
    });

    let response =
        gateway.handle(Request::ReconcileOrphans { active_run_ids: vec!["run-live".into()] }).await;
    let Response::Reconcile { orphaned_count, removed_containers } = response else {
        panic!("expected reconcile response");
    };
    assert_eq!(orphaned_count, 1);
    assert_eq!(removed_containers[0].run_id, "run-dead");
}

#[tokio::test]
async fn shutdown_stops_accepting_and_signals() {
    let fx = fixture(4);
    let response = fx.gateway.handle(Request::Shutdown).await;
    assert_eq!(response, Response::ShuttingDown);
    assert!(fx.gateway.shutdown_signal.is_cancelled());
    assert!(!fx.gateway.queue.can_accept());
}

#[tokio::test]
async fn socket_round_trip_and_event_stream() {
    let fx = fixture(4);
    let dir = TempDir::new().unwrap();
    let socket_path = dir.path().join("worker.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    let gateway = Arc::clone(&fx.gateway);
    let server = tokio::spawn(gateway.serve(listener));

    let mut client = UnixStream::connect(&socket_path).await.unwrap();

    // Unary request.
    write_message(&mut client, &Request::Ping).await.unwrap();
    let response: Option<Response> = read_message(&mut client).await.unwrap();
    assert_eq!(response, Some(Response::Pong));

    // Switch to streaming.
    write_message(&mut client, &Request::SubscribeEvents).await.unwrap();
    let response: Option<Response> = read_message(&mut client).await.unwrap();
    assert_eq!(response, Some(Response::Subscribed));

    fx.gateway.bus.publish_job(JobEvent {
        run_id: RunId::new("run-A"),
        event_type: JobEventType::Completed,
        summary: "done".into(),
        metadata: Default::default(),
        sequence: 1,
        category: "run.completed".into(),
        payload_json: None,
        schema_version: String::new(),
        timestamp_ms: 7,
    });

    let frame: Option<Response> = read_message(&mut client).await.unwrap();
    let Some(Response::Event { event }) = frame else { panic!("expected event frame") };
    assert_eq!(event.run_id, RunId::new("run-A"));
    assert_eq!(event.event_type, JobEventType::Completed);

    fx.gateway.shutdown_signal.cancel();
    server.await.unwrap();
}
