// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for the end-to-end specs.

pub use ad_adapters::runtime::{FakeBehavior, FakeRuntime, HarnessRuntimeRouter};
pub use ad_adapters::FakeContainerRuntime;
pub use ad_core::envelope::meta;
pub use ad_core::{
    BusMessage, FakeClock, JobEvent, JobEventType, RunEnvelope, RunId, RunRequest, RunState,
    RuntimeEventType, WorkerId,
};
pub use ad_engine::FakeWorkspaces;
pub use ad_storage::RunLedger;
pub use ad_wire::{Request, Response};
pub use ad_worker::{
    DispatchQueue, EventBus, Gateway, JobProcessor, OrphanReconciler, RunPipeline,
};
pub use std::sync::Arc;
pub use std::time::Duration;
pub use tempfile::TempDir;
pub use tokio_util::sync::CancellationToken;

/// A worker assembled from real parts over the fake seams.
pub struct Worker {
    dir: TempDir,
    pub ledger: Arc<RunLedger<FakeClock>>,
    pub queue: Arc<DispatchQueue<FakeClock>>,
    pub gateway: Arc<Gateway<FakeClock>>,
    pub containers: Arc<FakeContainerRuntime>,
    pub bus: EventBus,
    processor: Option<tokio::task::JoinHandle<()>>,
}

impl Worker {
    /// Start a worker with the given slot budget and seams.
    pub fn start(max_slots: usize, workspaces: FakeWorkspaces, router: HarnessRuntimeRouter) -> Self {
        let dir = TempDir::new().expect("tempdir");
        Self::start_in(dir, max_slots, workspaces, router)
    }

    /// Start against an existing state dir (restart scenarios).
    pub fn start_in(
        dir: TempDir,
        max_slots: usize,
        workspaces: FakeWorkspaces,
        router: HarnessRuntimeRouter,
    ) -> Self {
        let clock = FakeClock::new();
        let ledger = Arc::new(
            RunLedger::open(&dir.path().join("ledger.jsonl"), clock.clone()).expect("ledger"),
        );
        let (queue, work_rx) =
            DispatchQueue::new(Arc::clone(&ledger), max_slots, CancellationToken::new());
        queue.recover().expect("recovery");

        let containers = Arc::new(FakeContainerRuntime::new());
        let bus = EventBus::new();
        let pipeline = Arc::new(RunPipeline::new(
            Arc::clone(&ledger),
            Arc::new(workspaces),
            Arc::new(router),
            containers.clone(),
            bus.clone(),
            dir.path().join("state"),
            Duration::from_secs(30),
            clock.clone(),
        ));
        let processor = JobProcessor::new(Arc::clone(&queue), pipeline);
        let processor = tokio::spawn(processor.run(work_rx));

        let gateway = Arc::new(Gateway {
            queue: Arc::clone(&queue),
            bus: bus.clone(),
            reconciler: Arc::new(OrphanReconciler::new(containers.clone())),
            worker_id: WorkerId::new("wrk-spec"),
            shutdown_signal: CancellationToken::new(),
            clock: clock.clone(),
        });

        Self { dir, ledger, queue, gateway, containers, bus, processor: Some(processor) }
    }

    /// Dispatch over the gateway, as the control plane would.
    pub async fn dispatch(&self, request: RunRequest) -> Response {
        self.gateway.handle(Request::Dispatch { request }).await
    }

    /// Wait until the run reaches a terminal ledger state.
    pub async fn wait_terminal(&self, run_id: &str) -> RunState {
        for _ in 0..500 {
            if let Some(entry) = self.ledger.get_snapshot(&RunId::new(run_id)) {
                if entry.state.is_terminal() {
                    return entry.state;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("run {run_id} never reached a terminal state");
    }

    /// The terminal envelope recorded in the ledger.
    pub fn envelope(&self, run_id: &str) -> RunEnvelope {
        let entry = self.ledger.get_snapshot(&RunId::new(run_id)).expect("entry");
        serde_json::from_str(entry.payload_json.as_deref().expect("payload")).expect("envelope")
    }

    /// Stop the processor (ungraceful, like a crash for restart tests).
    ///
    /// The test runtime reaps spawned tasks on its own at teardown; this
    /// exists only to hand the state dir to a restarted worker.
    pub async fn crash(mut self) -> TempDir {
        if let Some(processor) = self.processor.take() {
            processor.abort();
            let _ = processor.await;
        }
        self.dir
    }
}

/// A request for the default codex harness.
pub fn spec_request(run_id: &str) -> RunRequest {
    RunRequest::builder()
        .run_id(run_id)
        .harness("codex")
        .clone_url("https://github.com/acme/widgets.git")
        .build()
}

/// Collect job events for a run from a bus subscription.
pub fn drain_events(
    rx: &mut tokio::sync::broadcast::Receiver<BusMessage>,
    run_id: &str,
) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let BusMessage::Job(event) = message {
            if event.run_id == RunId::new(run_id) {
                events.push(event);
            }
        }
    }
    events
}
