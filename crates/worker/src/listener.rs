// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker gateway RPC listener.
//!
//! Unix socket, length-prefixed JSON frames. Unary requests get one
//! response; `SubscribeEvents` turns the connection into a stream of
//! `Event`/`Status` frames that ends when the client disconnects or the
//! worker shuts down.

use crate::bus::EventBus;
use crate::queue::DispatchQueue;
use crate::reconcile::OrphanReconciler;
use ad_core::{BusMessage, Clock, RunId, WorkerId, WorkerStatus};
use ad_wire::{read_message, write_message, RemovedContainer, Request, Response};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shared state behind the RPC surface.
pub struct Gateway<C: Clock> {
    pub queue: Arc<DispatchQueue<C>>,
    pub bus: EventBus,
    pub reconciler: Arc<OrphanReconciler>,
    pub worker_id: WorkerId,
    /// Soft shutdown signal; the lifecycle turns it into a hard cancel
    /// after the grace window.
    pub shutdown_signal: CancellationToken,
    pub clock: C,
}

impl<C: Clock + 'static> Gateway<C> {
    /// Handle one unary request.
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::Dispatch { request } => {
                if let Err(e) = request.validate() {
                    return Response::Dispatch { accepted: false, reason: Some(e.to_string()) };
                }
                if !self.queue.can_accept() {
                    return Response::Dispatch {
                        accepted: false,
                        reason: Some("worker at capacity".to_string()),
                    };
                }
                match self.queue.enqueue(request) {
                    Ok(()) => Response::Dispatch { accepted: true, reason: None },
                    Err(e) => Response::Dispatch { accepted: false, reason: Some(e.to_string()) },
                }
            }

            Request::Cancel { run_id } => {
                Response::Cancel { accepted: self.queue.cancel(&RunId::new(run_id)) }
            }

            Request::Heartbeat { worker_id, active_slots, max_slots } => {
                self.bus.publish_status(WorkerStatus {
                    worker_id,
                    status: "running".to_string(),
                    active_slots,
                    max_slots,
                    timestamp_ms: self.clock.epoch_ms(),
                    message: String::new(),
                });
                Response::Heartbeat { acknowledged: true }
            }

            Request::ReconcileOrphans { active_run_ids } => {
                let active: HashSet<String> =
                    active_run_ids.iter().map(|id| id.to_ascii_lowercase()).collect();
                match self.reconciler.reconcile(&active).await {
                    Ok(report) => Response::Reconcile {
                        orphaned_count: report.orphans_detected,
                        removed_containers: report
                            .removed
                            .into_iter()
                            .map(|(container_id, run_id)| RemovedContainer {
                                container_id: container_id.to_string(),
                                run_id: run_id.to_string(),
                            })
                            .collect(),
                    },
                    Err(e) => Response::Error { message: e.to_string() },
                }
            }

            Request::Shutdown => {
                info!("shutdown requested over RPC");
                self.queue.stop_accepting();
                self.shutdown_signal.cancel();
                Response::ShuttingDown
            }

            Request::SubscribeEvents => Response::Subscribed,
        }
    }

    /// Accept loop; one task per connection.
    pub async fn serve(self: Arc<Self>, listener: UnixListener) {
        loop {
            let stream = tokio::select! {
                _ = self.shutdown_signal.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => stream,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };
            let gateway = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = gateway.handle_connection(stream).await {
                    warn!(error = %e, "connection closed with error");
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: UnixStream) -> Result<(), ad_wire::ProtocolError> {
        loop {
            let request: Option<Request> = tokio::select! {
                _ = self.shutdown_signal.cancelled() => return Ok(()),
                request = read_message(&mut stream) => request?,
            };
            let Some(request) = request else { return Ok(()) };

            let subscribe = matches!(request, Request::SubscribeEvents);
            let response = self.handle(request).await;
            write_message(&mut stream, &response).await?;

            if subscribe {
                return self.stream_events(stream).await;
            }
        }
    }

    /// Forward bus messages until disconnect or shutdown.
    async fn stream_events(&self, mut stream: UnixStream) -> Result<(), ad_wire::ProtocolError> {
        let mut rx = self.bus.subscribe();
        loop {
            let message = tokio::select! {
                _ = self.shutdown_signal.cancelled() => return Ok(()),
                message = rx.recv() => message,
            };
            let frame = match message {
                Ok(BusMessage::Job(event)) => Response::Event { event },
                Ok(BusMessage::Worker(status)) => Response::Status { status },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event subscriber lagged");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
            };
            write_message(&mut stream, &frame).await?;
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
