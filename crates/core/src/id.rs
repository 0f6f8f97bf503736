// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes.
//!
//! Run ids originate at the control plane and are treated as opaque
//! strings; matching is case-insensitive, so every keyed lookup goes
//! through [`RunId::normalized`].

/// Returns a string slice truncated to at most `n` bytes, backing off to
/// the nearest character boundary.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        return s;
    }
    let mut end = n;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

crate::string_id! {
    /// Unique identifier for a run (one agent invocation).
    ///
    /// Assigned by the control plane; the system-wide unique key for
    /// ledger rows, queue slots, and container labels.
    pub struct RunId;
}

impl RunId {
    /// Case-folded form used as the key in every run-keyed map.
    pub fn normalized(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

crate::string_id! {
    /// Identifier of the task a run executes against.
    pub struct TaskId;
}

crate::string_id! {
    /// Identifier of the repository a task belongs to.
    pub struct RepoId;
}

crate::string_id! {
    /// Unique identifier for a worker instance.
    pub struct WorkerId;
}

impl WorkerId {
    /// Generate a random worker id (used when `WORKER_ID` is not set).
    pub fn generate() -> Self {
        Self(format!("wrk-{}", nanoid::nanoid!(12)))
    }
}

crate::string_id! {
    /// Container id as reported by the container runtime.
    pub struct ContainerId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
