//! Structured pipeline events.
//!
//! Every hop of a request (query received, retrieval finished, answer
//! generated, document ingested or deleted) is emitted as one `tracing` event
//! on the `docent::events` target, keyed by the request's trace id, so a log
//! collector can reassemble a request from its events.

use serde::Serialize;
use uuid::Uuid;

pub const EVENT_TARGET: &str = "docent::events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Ingest,
    Query,
    Retrieval,
    Answer,
    Delete,
    Rebuild,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    /// Milliseconds since the Unix epoch, UTC.
    pub timestamp: i64,
    pub sender: &'static str,
    pub receiver: &'static str,
    pub kind: EventKind,
    pub trace_id: Uuid,
    pub payload: serde_json::Value,
}

impl PipelineEvent {
    #[must_use]
    pub fn new(
        sender: &'static str,
        receiver: &'static str,
        kind: EventKind,
        trace_id: Uuid,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            sender,
            receiver,
            kind,
            trace_id,
            payload,
        }
    }

    pub fn emit(&self) {
        match serde_json::to_string(&self.payload) {
            Ok(payload) => tracing::info!(
                target: EVENT_TARGET,
                timestamp = self.timestamp,
                sender = self.sender,
                receiver = self.receiver,
                kind = ?self.kind,
                trace_id = %self.trace_id,
                payload = %payload,
                "pipeline event"
            ),
            Err(e) => tracing::warn!(target: EVENT_TARGET, "failed to encode event payload: {e}"),
        }
    }
}
