//! Append-only diagnostic trace.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a trace event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventKind {
    /// A path search between a fact and a target.
    PathSearch,
    /// A link evaluated successfully.
    LinkEvaluated,
    /// A link evaluation failed.
    LinkFailed,
    /// A candidate fact produced nothing usable.
    CandidateRejected,
    /// A requested node was resolved.
    NodeResolved,
    /// A requested node could not be resolved.
    NodeUnresolved,
    /// A nested query was issued.
    NestedQuery,
    /// A parameter object was constructed (or construction failed).
    Construction,
}

/// One recorded step of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// When the event was recorded.
    pub at: DateTime<Utc>,
    /// Nesting depth of the query that recorded the event.
    pub depth: usize,
    /// What happened.
    pub kind: TraceEventKind,
    /// Human-readable detail.
    pub message: String,
}

/// Diagnostic trace shared by a query and its nested queries.
#[derive(Debug, Default)]
pub struct DiagnosticTrace {
    events: Mutex<Vec<TraceEvent>>,
}

impl DiagnosticTrace {
    /// An empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn record(&self, depth: usize, kind: TraceEventKind, message: impl Into<String>) {
        let event = TraceEvent {
            at: Utc::now(),
            depth,
            kind,
            message: message.into(),
        };
        // A panic elsewhere must not lose diagnostics; keep appending.
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        events.push(event);
    }

    /// Copy of every event so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TraceEvent> {
        self.since(0)
    }

    /// Events recorded after the first `start` events.
    #[must_use]
    pub fn since(&self, start: usize) -> Vec<TraceEvent> {
        let events = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        events.get(start..).map(<[TraceEvent]>::to_vec).unwrap_or_default()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let trace = DiagnosticTrace::new();
        assert!(trace.is_empty());
        trace.record(0, TraceEventKind::PathSearch, "first");
        trace.record(1, TraceEventKind::NestedQuery, "second");
        let events = trace.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "first");
        assert_eq!(events[1].depth, 1);
        assert_eq!(trace.since(1).len(), 1);
        assert!(trace.since(5).is_empty());
    }

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_string(&TraceEventKind::LinkFailed).unwrap();
        assert_eq!(json, "\"link_failed\"");
    }
}
