// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key async mutex registry.
//!
//! Workspaces are pinned to `(repo_id, task_id)`; at most one run may
//! hold a task's workspace at a time. Entries are kept for the process
//! lifetime; cleanup is not required for correctness.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of named single-holder async mutexes.
#[derive(Default)]
pub struct KeyedMutex {
    entries: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the mutex for `key`, waiting if another holder is inside.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut entries = self.entries.lock();
            Arc::clone(entries.entry(key.to_string()).or_default())
        };
        entry.lock_owned().await
    }

    /// Number of registered keys (diagnostics only).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "keyed_mutex_tests.rs"]
mod tests;
