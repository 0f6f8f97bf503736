// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The queue consumer: one pipeline task per admitted run.

use crate::pipeline::RunPipeline;
use crate::queue::DispatchQueue;
use ad_core::{Clock, RunRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Consumes admitted runs and drives their pipelines; `max_slots`
/// pipelines may be in flight at once (enforced at admission).
pub struct JobProcessor<C: Clock + 'static> {
    queue: Arc<DispatchQueue<C>>,
    pipeline: Arc<RunPipeline<C>>,
}

impl<C: Clock + 'static> JobProcessor<C> {
    pub fn new(queue: Arc<DispatchQueue<C>>, pipeline: Arc<RunPipeline<C>>) -> Self {
        Self { queue, pipeline }
    }

    /// Run until the work channel closes, then drain in-flight runs.
    pub async fn run(self, mut work_rx: mpsc::UnboundedReceiver<RunRequest>) {
        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                request = work_rx.recv() => {
                    let Some(request) = request else { break };
                    self.spawn_run(&mut tasks, request);
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        warn!(error = %e, "run task panicked or was aborted");
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "work channel closed, draining in-flight runs");
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "run task panicked or was aborted");
            }
        }
    }

    fn spawn_run(&self, tasks: &mut JoinSet<()>, request: RunRequest) {
        let Some(job) = self.queue.get(&request.run_id) else {
            // Cancelled and reaped between admission and pickup.
            info!(run_id = %request.run_id, "skipping run no longer in the registry");
            return;
        };
        let queue = Arc::clone(&self.queue);
        let pipeline = Arc::clone(&self.pipeline);
        tasks.spawn(async move {
            let run_id = request.run_id.clone();
            pipeline.execute(request, job.cancel).await;
            queue.mark_completed(&run_id);
        });
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
