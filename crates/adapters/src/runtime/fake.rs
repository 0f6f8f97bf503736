// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable runtime adapter for tests.

use super::{AdapterError, EventSink, RunContext, RuntimeAdapter, RuntimeResult};
use ad_core::{RunEnvelope, RunId, RunRequest, RuntimeEventType};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One recorded invocation of a [`FakeRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRuntimeCall {
    pub run_id: RunId,
    pub harness: String,
}

/// What the fake should do on an invocation.
#[derive(Clone)]
pub enum FakeBehavior {
    /// Emit the scripted events, then return the envelope.
    Succeed { events: Vec<(RuntimeEventType, String)>, envelope: RunEnvelope },
    /// Fail with [`AdapterError::IncompleteStream`] (fallback trigger).
    FailIncomplete,
    /// Fail with a runtime error message.
    FailRuntime(String),
    /// Block until cancelled, then return [`AdapterError::Cancelled`].
    HangUntilCancelled,
}

struct FakeState {
    behaviors: VecDeque<FakeBehavior>,
    calls: Vec<FakeRuntimeCall>,
}

/// In-memory [`RuntimeAdapter`] with scripted behaviors.
///
/// Behaviors are consumed in order; the last one repeats.
#[derive(Clone)]
pub struct FakeRuntime {
    name: &'static str,
    state: Arc<Mutex<FakeState>>,
}

impl FakeRuntime {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(FakeState { behaviors: VecDeque::new(), calls: Vec::new() })),
        }
    }

    /// Fake that immediately succeeds with the given envelope.
    pub fn succeeding(name: &'static str, envelope: RunEnvelope) -> Self {
        Self::new(name).with_behavior(FakeBehavior::Succeed { events: Vec::new(), envelope })
    }

    pub fn with_behavior(self, behavior: FakeBehavior) -> Self {
        self.state.lock().behaviors.push_back(behavior);
        self
    }

    /// Invocations recorded so far.
    pub fn calls(&self) -> Vec<FakeRuntimeCall> {
        self.state.lock().calls.clone()
    }

    fn next_behavior(&self) -> Option<FakeBehavior> {
        let mut state = self.state.lock();
        if state.behaviors.len() > 1 {
            state.behaviors.pop_front()
        } else {
            state.behaviors.front().cloned()
        }
    }
}

#[async_trait]
impl RuntimeAdapter for FakeRuntime {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(
        &self,
        request: &RunRequest,
        _ctx: &RunContext,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RuntimeResult, AdapterError> {
        self.state.lock().calls.push(FakeRuntimeCall {
            run_id: request.run_id.clone(),
            harness: request.harness.clone(),
        });

        match self.next_behavior() {
            Some(FakeBehavior::Succeed { events, envelope }) => {
                for (kind, content) in events {
                    sink.emit(kind, content, HashMap::new());
                }
                sink.emit(RuntimeEventType::RunCompleted, envelope.summary.clone(), HashMap::new());
                Ok(RuntimeResult { envelope, exit_code: Some(0) })
            }
            Some(FakeBehavior::FailIncomplete) => Err(AdapterError::IncompleteStream),
            Some(FakeBehavior::FailRuntime(message)) => Err(AdapterError::Runtime(message)),
            Some(FakeBehavior::HangUntilCancelled) => {
                cancel.cancelled().await;
                Err(AdapterError::Cancelled)
            }
            None => Ok(RuntimeResult {
                envelope: RunEnvelope::succeeded("fake run completed"),
                exit_code: Some(0),
            }),
        }
    }
}
