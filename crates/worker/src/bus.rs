// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fan-out of run events and worker status.
//!
//! Subscribers get a fresh receiver over future messages; there is no
//! replay. Dropping the bus completes every receiver.

use ad_core::{BusMessage, JobEvent, WorkerStatus};
use tokio::sync::broadcast;

/// Buffered messages per lagging subscriber before it starts missing.
const BUS_CAPACITY: usize = 2048;

/// Multi-producer, multi-consumer event fan-out.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusMessage>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Subscribe to all future messages.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }

    /// Publish a message; subscriber-less sends are fine.
    pub fn publish(&self, message: BusMessage) {
        let _ = self.tx.send(message);
    }

    pub fn publish_job(&self, event: JobEvent) {
        self.publish(BusMessage::Job(event));
    }

    pub fn publish_status(&self, status: WorkerStatus) {
        self.publish(BusMessage::Worker(status));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
