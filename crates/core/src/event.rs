// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime event stream types.
//!
//! Adapters emit typed [`RuntimeEvent`]s through the sink; on the wire
//! (container log stream, RPC) each event travels inside a marker
//! envelope so the processor can tell structured events apart from
//! opaque log text. A log chunk is interpreted as a runtime event iff it
//! parses as JSON with the v1 marker, a positive sequence, and a
//! non-empty type; everything else is forwarded verbatim as a
//! `log_chunk` job event.

use crate::id::{RunId, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Marker distinguishing harness runtime events from opaque log text.
pub const EVENT_MARKER: &str = "agentsdashboard.harness-runtime-event.v1";

/// Schema version assumed when neither the embedded payload nor the
/// request provides one.
pub const DEFAULT_SCHEMA_VERSION: &str = "harness-structured-event-v2";

/// Typed runtime event kinds, ordered per run by `sequence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeEventType {
    RunLifecycle,
    AssistantDelta,
    ReasoningDelta,
    CommandDelta,
    DiffUpdated,
    UsageUpdated,
    Diagnostic,
    Error,
    RunCompleted,
}

impl RuntimeEventType {
    /// The `type` string used inside the wire envelope.
    pub fn wire_str(&self) -> &'static str {
        match self {
            RuntimeEventType::RunLifecycle => "log",
            RuntimeEventType::AssistantDelta => "assistant_delta",
            RuntimeEventType::ReasoningDelta => "reasoning_delta",
            RuntimeEventType::CommandDelta => "command_output",
            RuntimeEventType::DiffUpdated => "diff_update",
            RuntimeEventType::UsageUpdated => "usage_updated",
            RuntimeEventType::Diagnostic => "diagnostic",
            RuntimeEventType::Error => "error",
            RuntimeEventType::RunCompleted => "completion",
        }
    }

    /// Parse a wire `type` string back into a typed kind.
    pub fn from_wire_str(s: &str) -> Option<Self> {
        Some(match s {
            "log" => RuntimeEventType::RunLifecycle,
            "assistant_delta" => RuntimeEventType::AssistantDelta,
            "reasoning_delta" => RuntimeEventType::ReasoningDelta,
            "command_output" => RuntimeEventType::CommandDelta,
            "diff_update" => RuntimeEventType::DiffUpdated,
            "usage_updated" | "session.usage" => RuntimeEventType::UsageUpdated,
            "diagnostic" => RuntimeEventType::Diagnostic,
            "error" => RuntimeEventType::Error,
            "completion" => RuntimeEventType::RunCompleted,
            _ => return None,
        })
    }
}

/// One event emitted by a runtime adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    /// Monotonic per-run sequence assigned by the sink, starting at 1.
    pub sequence: u64,
    #[serde(rename = "type")]
    pub event_type: RuntimeEventType,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// The wire envelope wrapping a runtime event in a log stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub marker: String,
    pub sequence: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl WireEvent {
    /// Wrap a typed runtime event for the wire.
    pub fn from_runtime(event: &RuntimeEvent) -> Self {
        Self {
            marker: EVENT_MARKER.to_string(),
            sequence: event.sequence,
            event_type: event.event_type.wire_str().to_string(),
            content: event.content.clone(),
            metadata: event.metadata.clone(),
        }
    }

    /// The typed kind, when the wire type string is one we emit.
    pub fn runtime_type(&self) -> Option<RuntimeEventType> {
        RuntimeEventType::from_wire_str(&self.event_type)
    }
}

/// Parse a log chunk as a wire event.
///
/// Returns `None` unless the chunk is JSON carrying the v1 marker, a
/// sequence greater than zero, and a non-empty type.
pub fn parse_wire_event(chunk: &str) -> Option<WireEvent> {
    let trimmed = chunk.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let event: WireEvent = serde_json::from_str(trimmed).ok()?;
    if event.marker != EVENT_MARKER || event.sequence == 0 || event.event_type.is_empty() {
        return None;
    }
    Some(event)
}

/// Canonical event categories produced by projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    RunLifecycle,
    AssistantDelta,
    ReasoningDelta,
    CommandDelta,
    DiffUpdated,
    UsageUpdated,
    Error,
    RunCompleted,
}

crate::simple_display! {
    EventCategory {
        RunLifecycle => "run.lifecycle",
        AssistantDelta => "assistant.delta",
        ReasoningDelta => "reasoning.delta",
        CommandDelta => "command.delta",
        DiffUpdated => "diff.updated",
        UsageUpdated => "usage.updated",
        Error => "error",
        RunCompleted => "run.completed",
    }
}

/// Map a structured event type string to its canonical category.
///
/// Unknown types pass through lowercased rather than mapping to a fixed
/// bucket, so new harness event kinds stay distinguishable downstream.
fn canonical_category(event_type: &str) -> String {
    let t = event_type.trim();
    let category = match t {
        "" => EventCategory::RunLifecycle,
        "reasoning_delta" => EventCategory::ReasoningDelta,
        "assistant_delta" => EventCategory::AssistantDelta,
        "command_output" => EventCategory::CommandDelta,
        "diff_update" => EventCategory::DiffUpdated,
        "diagnostic" | "error" => EventCategory::Error,
        "completion" => EventCategory::RunCompleted,
        "session.usage" | "usage.updated" | "usage_updated" => EventCategory::UsageUpdated,
        "log" => EventCategory::RunLifecycle,
        _ if t.starts_with("session.") => EventCategory::RunLifecycle,
        _ if t.starts_with("message.part.") => EventCategory::AssistantDelta,
        _ => return t.to_ascii_lowercase(),
    };
    category.to_string()
}

/// Result of projecting one runtime event for the outer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub category: String,
    /// The embedded structured payload (`properties`, or the whole
    /// object), serialized verbatim; `None` for plain-text content.
    pub payload_json: Option<String>,
    pub schema_version: String,
}

/// Project a runtime event to its canonical category.
///
/// When `content` carries embedded structured JSON (`{"type": ...,
/// "schemaVersion"?, "properties"?}`) the embedded type wins and the
/// payload is the `properties` object (or the root, absent one). The
/// schema version precedence is embedded value, then the
/// request-provided override, then [`DEFAULT_SCHEMA_VERSION`].
pub fn project(event_type: &str, content: &str, request_version: Option<&str>) -> Projection {
    let fallback_version = || {
        request_version
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_SCHEMA_VERSION)
            .to_string()
    };

    let trimmed = content.trim_start();
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Some(embedded_type) = value.get("type").and_then(|t| t.as_str()) {
                let schema_version = value
                    .get("schemaVersion")
                    .and_then(|v| v.as_str())
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_string())
                    .unwrap_or_else(fallback_version);
                let payload = value.get("properties").unwrap_or(&value);
                let payload_json = serde_json::to_string(payload).ok();
                return Projection {
                    category: canonical_category(embedded_type),
                    payload_json,
                    schema_version,
                };
            }
        }
    }

    Projection {
        category: canonical_category(event_type),
        payload_json: None,
        schema_version: fallback_version(),
    }
}

/// Outer event kind on the control-plane stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventType {
    Log,
    LogChunk,
    Completed,
}

crate::simple_display! {
    JobEventType {
        Log => "log",
        LogChunk => "log_chunk",
        Completed => "completed",
    }
}

/// One event on the control-plane subscription stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub run_id: RunId,
    pub event_type: JobEventType,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub sequence: u64,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_json: Option<String>,
    #[serde(default)]
    pub schema_version: String,
    pub timestamp_ms: u64,
}

/// Periodic worker health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub worker_id: WorkerId,
    pub status: String,
    pub active_slots: u32,
    pub max_slots: u32,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub message: String,
}

/// Message on the in-process event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusMessage {
    Job(JobEvent),
    Worker(WorkerStatus),
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
