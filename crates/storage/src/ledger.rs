// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL run ledger with crash-safe transitions.
//!
//! One line of JSON per committed transition; replay on open keeps the
//! last line per run id. Every write is appended and fsynced before the
//! in-memory index is touched, so a failed write leaves the ledger
//! unchanged. Compare-and-set on `state` is emulated with a single
//! ledger-wide mutex held across read-validate-append-apply.
//!
//! A corrupt tail (torn write on crash) does not poison the ledger: the
//! damaged file is rotated to `.bak` and a clean file is rewritten from
//! the valid prefix.

use ad_core::{Clock, RunId, RunLedgerEntry, RunRequest, RunState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Summary stamped on entries swept from `Running` at startup.
pub const STALE_RUNNING_SUMMARY: &str = "task runtime restarted before completion";

/// Rewrite the file once it holds this many lines per live entry.
const COMPACT_FACTOR: usize = 4;

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run {run_id}: transition {from} -> {to} not permitted")]
    InvalidTransition { run_id: String, from: RunState, to: RunState },
    #[error("state {0} is not terminal")]
    NotTerminal(RunState),
    #[error("run not found: {0}")]
    NotFound(String),
}

struct Inner {
    file: File,
    path: PathBuf,
    /// Last committed entry per normalized run id.
    index: HashMap<String, RunLedgerEntry>,
    /// Lines in the file since the last compaction.
    line_count: usize,
}

/// Durable source of truth for run state.
pub struct RunLedger<C: Clock> {
    clock: C,
    inner: Mutex<Inner>,
}

impl<C: Clock> RunLedger<C> {
    /// Open or create a ledger at the given path, replaying existing
    /// entries into memory.
    pub fn open(path: &Path, clock: C) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (index, line_count, valid_lines, corrupt) = match File::open(path) {
            Ok(file) => Self::replay(&file)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => (HashMap::new(), 0, Vec::new(), false),
            Err(e) => return Err(e.into()),
        };

        if corrupt {
            let bak_path = path.with_extension("jsonl.bak");
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_entries = valid_lines.len(),
                "corrupt ledger tail detected, rotating to .bak and preserving valid entries",
            );
            std::fs::rename(path, &bak_path)?;
            let mut clean = File::create(path)?;
            for line in &valid_lines {
                clean.write_all(line.as_bytes())?;
                clean.write_all(b"\n")?;
            }
            clean.sync_all()?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            clock,
            inner: Mutex::new(Inner { file, path: path.to_owned(), index, line_count }),
        })
    }

    /// Replay all lines, keeping the last entry per run id.
    ///
    /// Returns `(index, line_count, valid_lines, corrupt)`; `corrupt` is
    /// true when an unparseable line was hit (replay stops there).
    #[allow(clippy::type_complexity)]
    fn replay(
        file: &File,
    ) -> Result<(HashMap<String, RunLedgerEntry>, usize, Vec<String>, bool), LedgerError> {
        let mut reader = BufReader::new(file);
        let mut index = HashMap::new();
        let mut valid_lines = Vec::new();
        let mut corrupt = false;
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    corrupt = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let entry: RunLedgerEntry = match serde_json::from_str(trimmed) {
                Ok(entry) => entry,
                Err(_) => {
                    corrupt = true;
                    break;
                }
            };

            index.insert(entry.run_id.normalized(), entry);
            valid_lines.push(trimmed.to_string());
        }

        let count = valid_lines.len();
        Ok((index, count, valid_lines, corrupt))
    }

    /// Create or reset an entry to `Queued`, persisting the request.
    ///
    /// Idempotent for already-queued runs (only `updated_at` moves); a
    /// terminal entry is reset for re-dispatch. A `Running` entry may not
    /// be re-queued.
    pub fn upsert_queued(&self, request: &RunRequest) -> Result<RunLedgerEntry, LedgerError> {
        let now = self.clock.epoch_ms();
        let request_json = serde_json::to_string(request)?;
        let mut inner = self.inner.lock();
        let key = request.run_id.normalized();

        let entry = match inner.index.get(&key) {
            Some(existing) => {
                if !RunState::Queued.accepts_from(existing.state) {
                    return Err(LedgerError::InvalidTransition {
                        run_id: request.run_id.to_string(),
                        from: existing.state,
                        to: RunState::Queued,
                    });
                }
                RunLedgerEntry {
                    state: RunState::Queued,
                    summary: String::new(),
                    payload_json: None,
                    request_json,
                    started_at_ms: None,
                    ended_at_ms: None,
                    updated_at_ms: now,
                    ..existing.clone()
                }
            }
            None => RunLedgerEntry {
                run_id: request.run_id.clone(),
                task_id: request.task_id.clone(),
                state: RunState::Queued,
                summary: String::new(),
                payload_json: None,
                request_json,
                created_at_ms: now,
                started_at_ms: None,
                ended_at_ms: None,
                updated_at_ms: now,
            },
        };

        Self::commit(&mut inner, key, entry)
    }

    /// Transition a run from `Queued` to `Running`, stamping `started_at`.
    pub fn mark_running(&self, run_id: &RunId) -> Result<RunLedgerEntry, LedgerError> {
        self.transition(run_id, RunState::Running, None, None)
    }

    /// Transition a run into a terminal state.
    pub fn mark_completed(
        &self,
        run_id: &RunId,
        state: RunState,
        summary: &str,
        payload_json: Option<String>,
    ) -> Result<RunLedgerEntry, LedgerError> {
        if !state.is_terminal() {
            return Err(LedgerError::NotTerminal(state));
        }
        self.transition(run_id, state, Some(summary.to_string()), payload_json)
    }

    fn transition(
        &self,
        run_id: &RunId,
        to: RunState,
        summary: Option<String>,
        payload_json: Option<String>,
    ) -> Result<RunLedgerEntry, LedgerError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let key = run_id.normalized();

        let existing = inner
            .index
            .get(&key)
            .ok_or_else(|| LedgerError::NotFound(run_id.to_string()))?;

        if !to.accepts_from(existing.state) {
            return Err(LedgerError::InvalidTransition {
                run_id: run_id.to_string(),
                from: existing.state,
                to,
            });
        }

        let mut entry = existing.clone();
        entry.state = to;
        entry.updated_at_ms = now;
        if let Some(summary) = summary {
            entry.summary = summary;
        }
        if payload_json.is_some() {
            entry.payload_json = payload_json;
        }
        if to == RunState::Running && entry.started_at_ms.is_none() {
            entry.started_at_ms = Some(now);
        }
        if to.is_terminal() {
            entry.ended_at_ms = Some(now);
        }

        Self::commit(&mut inner, key, entry)
    }

    /// Sweep every `Running` entry to `Failed` (startup recovery).
    ///
    /// Returns the ids that were swept.
    pub fn recover_stale_running(&self) -> Result<Vec<RunId>, LedgerError> {
        let stale = self.list_running_ids();
        for run_id in &stale {
            warn!(run_id = %run_id, "sweeping stale Running entry to Failed");
            self.transition(
                run_id,
                RunState::Failed,
                Some(STALE_RUNNING_SUMMARY.to_string()),
                None,
            )?;
        }
        Ok(stale)
    }

    /// All queued entries with their parsed requests, in creation order.
    ///
    /// Entries whose stored request no longer parses are skipped with a
    /// warning rather than poisoning recovery.
    pub fn list_queued_requests(&self) -> Vec<(RunLedgerEntry, RunRequest)> {
        let inner = self.inner.lock();
        let mut queued: Vec<(RunLedgerEntry, RunRequest)> = inner
            .index
            .values()
            .filter(|entry| entry.state == RunState::Queued)
            .filter_map(|entry| match serde_json::from_str(&entry.request_json) {
                Ok(request) => Some((entry.clone(), request)),
                Err(e) => {
                    warn!(run_id = %entry.run_id, error = %e, "skipping queued entry with unparseable request");
                    None
                }
            })
            .collect();
        queued.sort_by(|(a, _), (b, _)| {
            a.created_at_ms.cmp(&b.created_at_ms).then_with(|| a.run_id.cmp(&b.run_id))
        });
        queued
    }

    /// Ids of all entries currently in `Running`.
    pub fn list_running_ids(&self) -> Vec<RunId> {
        let inner = self.inner.lock();
        let mut ids: Vec<RunId> = inner
            .index
            .values()
            .filter(|entry| entry.state == RunState::Running)
            .map(|entry| entry.run_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Point-in-time copy of one entry.
    pub fn get_snapshot(&self, run_id: &RunId) -> Option<RunLedgerEntry> {
        self.inner.lock().index.get(&run_id.normalized()).cloned()
    }

    /// Append, fsync, then apply to the index. The durability point.
    fn commit(
        inner: &mut Inner,
        key: String,
        entry: RunLedgerEntry,
    ) -> Result<RunLedgerEntry, LedgerError> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        inner.file.write_all(&line)?;
        inner.file.sync_all()?;
        inner.line_count += 1;
        inner.index.insert(key, entry.clone());

        if inner.line_count > inner.index.len() * COMPACT_FACTOR + 64 {
            if let Err(e) = Self::compact(inner) {
                // The append already committed; compaction is best-effort.
                warn!(error = %e, "ledger compaction failed");
            }
        }

        Ok(entry)
    }

    /// Rewrite the file with one line per live entry (tmp + rename).
    fn compact(inner: &mut Inner) -> Result<(), LedgerError> {
        let tmp_path = inner.path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for entry in inner.index.values() {
                let mut line = serde_json::to_vec(entry)?;
                line.push(b'\n');
                tmp.write_all(&line)?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &inner.path)?;
        inner.file = OpenOptions::new().create(true).append(true).open(&inner.path)?;
        inner.line_count = inner.index.len();
        Ok(())
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
