// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ad-adapters: harness runtime adapters and the container executor.
//!
//! The [`runtime::RuntimeAdapter`] trait encapsulates one harness
//! invocation (Codex, OpenCode, Claude, ...); adapters run the harness
//! inside a container via [`container::ContainerRuntime`] and translate
//! its output into typed runtime events through the
//! [`runtime::EventSink`].

pub mod container;
pub mod credential;
pub mod runtime;
pub mod subprocess;

pub use container::{
    ContainerError, ContainerRuntime, ContainerSpec, DockerCli, OrchestratorContainer,
    LABEL_REPO_ID, LABEL_RUN_ID, LABEL_TASK_ID,
};
pub use runtime::{
    AdapterError, EventSink, HarnessRuntimeRouter, RouteDecision, RunContext, RuntimeAdapter,
    RuntimeResult,
};

#[cfg(any(test, feature = "test-support"))]
pub use container::FakeContainerRuntime;
#[cfg(any(test, feature = "test-support"))]
pub use runtime::{FakeBehavior, FakeRuntime, FakeRuntimeCall};
