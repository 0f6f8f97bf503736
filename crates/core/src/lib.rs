// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ad-core: Core domain types for the AgentsDashboard worker.

pub mod macros;

pub mod clock;
pub mod envelope;
pub mod event;
pub mod failure;
pub mod id;
pub mod request;
pub mod run;
pub mod units;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use envelope::{meta, EnvelopeArtifact, EnvelopeStatus, RunEnvelope};
pub use event::{
    parse_wire_event, project, BusMessage, EventCategory, JobEvent, JobEventType, Projection,
    RuntimeEvent, RuntimeEventType, WireEvent, WorkerStatus, DEFAULT_SCHEMA_VERSION, EVENT_MARKER,
};
pub use failure::{classify_failure, FailureClass, FailureVerdict};
pub use id::{short, ContainerId, RepoId, RunId, TaskId, WorkerId};
#[cfg(any(test, feature = "test-support"))]
pub use request::RunRequestBuilder;
pub use request::{
    ArtifactPolicy, ImageAttachment, InputPart, RequestError, RunRequest, SandboxProfile,
};
pub use run::{RunLedgerEntry, RunState};
pub use units::parse_size;
