//! Event types for inter-service communication.
//!
//! The attack path engine publishes these on an in-process broadcast channel;
//! collaborators forward them to notification and reporting services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{GraphId, TenantId};

/// Unique identifier for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// An event emitted by a Sentinel service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelEvent {
    pub id: EventId,
    pub tenant_id: TenantId,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub payload: EventPayload,
}

impl SentinelEvent {
    pub fn new(tenant_id: TenantId, source: EventSource, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            tenant_id,
            timestamp: Utc::now(),
            source,
            payload,
        }
    }
}

/// Which service emitted the event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Pathfind,
}

/// The event payload, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    // ── Graph lifecycle ───────────────────────────────────────────
    /// A graph computation was started (initial build or refresh).
    GraphComputationStarted { graph_id: GraphId },
    /// A graph reached `READY`.
    GraphComputed {
        graph_id: GraphId,
        node_count: usize,
        edge_count: usize,
        path_count: usize,
        top_risk_score: f64,
        duration_ms: u64,
    },
    /// A graph computation failed and the graph is in `ERROR`.
    GraphComputationFailed { graph_id: GraphId, error: String },

    // ── What-if analysis ──────────────────────────────────────────
    /// A simulation finished against a graph.
    SimulationCompleted {
        graph_id: GraphId,
        simulation_id: Uuid,
        simulation_type: String,
        paths_eliminated: usize,
        risk_reduction_percent: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_roundtrip() {
        let event = SentinelEvent::new(
            TenantId::new(),
            EventSource::Pathfind,
            EventPayload::GraphComputationStarted {
                graph_id: GraphId::new(),
            },
        );

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: SentinelEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, deserialized.id);
    }

    #[test]
    fn event_payload_tags() {
        let payload = EventPayload::GraphComputationFailed {
            graph_id: GraphId::new(),
            error: "Computation timeout: exceeded 300s limit".to_string(),
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"event_type\":\"GraphComputationFailed\""));
    }

    #[test]
    fn event_source_serializes_snake_case() {
        let event = SentinelEvent::new(
            TenantId::new(),
            EventSource::Pathfind,
            EventPayload::GraphComputationStarted {
                graph_id: GraphId::new(),
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["source"], "pathfind");
    }
}
