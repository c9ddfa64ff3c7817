//! Request and response types for attack path operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sentinel_core::types::{AssetType, Criticality, EdgeType};
use sentinel_core::{GraphId, TenantId};

// ── Scope ─────────────────────────────────────────────────────────

/// Which assets of a tenant's snapshot a graph covers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphScope {
    #[default]
    Full,
    Zone { zone: String },
    Custom { filter: AssetFilter },
}

/// Declarative asset predicate for a custom scope. An asset passes when it
/// satisfies every criterion that is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AssetFilter {
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default)]
    pub asset_types: Vec<AssetType>,
    #[serde(default)]
    pub min_criticality: Option<Criticality>,
    #[serde(default)]
    pub asset_ids: Vec<String>,
}

impl AssetFilter {
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
            && self.asset_types.is_empty()
            && self.min_criticality.is_none()
            && self.asset_ids.is_empty()
    }
}

// ── Graph ─────────────────────────────────────────────────────────

/// Lifecycle status of a graph. `Stale` is never stored; it is derived
/// when upstream data is newer than the last computation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphStatus {
    Computing,
    Ready,
    Stale,
    Error,
}

impl std::fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Computing => "COMPUTING",
            Self::Ready => "READY",
            Self::Stale => "STALE",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Statistics about the built graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub entry_point_count: usize,
    pub crown_jewel_count: usize,
    pub path_count: usize,
    /// Edges dropped because an endpoint was outside the scope or unknown.
    pub dropped_edges: usize,
    pub self_loops: usize,
    /// Connections collapsed into an edge already declared by the other endpoint.
    pub duplicate_edges: usize,
    /// Entry point / crown jewel designations dropped with an out-of-scope asset.
    pub excluded_designations: usize,
    /// Nodes with no vulnerability data in the feed.
    pub enrichment_gaps: usize,
    /// (entry, jewel) pairs searched without finding a route.
    pub unreachable_pairs: usize,
}

/// Externally visible state of a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    pub id: GraphId,
    pub tenant_id: TenantId,
    pub scope: GraphScope,
    pub status: GraphStatus,
    pub error_message: Option<String>,
    pub stats: Option<GraphStats>,
    pub created_at: DateTime<Utc>,
    pub computed_at: Option<DateTime<Utc>>,
    pub computation_ms: Option<u64>,
    /// blake3 hex digest of the snapshot and vulnerability input.
    pub input_fingerprint: Option<String>,
}

// ── Paths ─────────────────────────────────────────────────────────

/// Triage status of a path. Carried across refreshes by path id.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathStatus {
    #[default]
    Open,
    Mitigated,
    Accepted,
}

/// A scored attacker route from an entry point to a crown jewel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttackPath {
    /// UUID v5 over the node-id sequence.
    pub id: Uuid,
    pub source_id: String,
    pub target_id: String,
    pub node_ids: Vec<String>,
    pub edge_ids: Vec<String>,
    pub steps: Vec<AttackStep>,
    pub hop_count: usize,
    pub total_difficulty: f64,
    pub exploitability_score: f64,
    pub impact_score: f64,
    pub risk_score: f64,
    pub status: PathStatus,
}

/// A single edge traversal in an attack path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttackStep {
    pub from_id: String,
    pub to_id: String,
    pub edge_id: String,
    pub edge_type: EdgeType,
    pub technique: String,
    pub description: String,
    pub requires_auth: bool,
    pub traversal_difficulty: f64,
}

/// Filters for listing paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathFilter {
    #[serde(default)]
    pub min_risk_score: Option<f64>,
    #[serde(default)]
    pub status: Option<PathStatus>,
}

// ── Chokepoints ───────────────────────────────────────────────────

/// An asset whose remediation collapses many paths at once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chokepoint {
    pub node_id: String,
    pub name: String,
    pub asset_type: AssetType,
    pub paths_affected: usize,
    pub total_risk_mitigated: f64,
    pub priority_score: f64,
}

// ── Simulation ────────────────────────────────────────────────────

/// Security control a what-if simulation can add to an asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlType {
    /// Every connection touching the asset requires authentication.
    RequireAuth,
    /// Authentication plus a second factor.
    Mfa,
    /// Endpoint detection raises difficulty of every touching edge.
    Edr,
    /// Network filtering raises difficulty of touching network edges.
    Firewall,
}

/// A hypothetical graph mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationRequest {
    PatchVulnerability {
        cve_ids: Vec<String>,
    },
    SegmentNetwork {
        asset_id: String,
        new_zone: String,
    },
    AddControl {
        asset_id: String,
        control: ControlType,
    },
    RemoveAccess {
        asset_id: String,
        #[serde(default)]
        principal_id: Option<String>,
    },
    CompromiseAsset {
        asset_id: String,
    },
}

impl SimulationRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PatchVulnerability { .. } => "PATCH_VULNERABILITY",
            Self::SegmentNetwork { .. } => "SEGMENT_NETWORK",
            Self::AddControl { .. } => "ADD_CONTROL",
            Self::RemoveAccess { .. } => "REMOVE_ACCESS",
            Self::CompromiseAsset { .. } => "COMPROMISE_ASSET",
        }
    }
}

/// Before/after comparison produced by a simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub id: Uuid,
    pub graph_id: GraphId,
    pub request: SimulationRequest,
    pub paths_before: usize,
    pub paths_after: usize,
    pub paths_eliminated: usize,
    pub paths_introduced: usize,
    pub eliminated_path_ids: Vec<Uuid>,
    pub risk_before: f64,
    pub risk_after: f64,
    /// `max(0, 1 - risk_after / risk_before) × 100`.
    pub risk_reduction_percent: f64,
    /// The parameters referenced nothing in the graph.
    pub no_op: bool,
    pub recommendation: String,
    pub blast_radius: Option<BlastRadiusResult>,
    pub completed_at: DateTime<Utc>,
    /// Set when the simulation did not finish; counts then describe the
    /// unmodified graph.
    #[serde(default)]
    pub error_message: Option<String>,
}

// ── Blast radius ──────────────────────────────────────────────────

/// Result of a blast radius computation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlastRadiusResult {
    pub compromised_node_id: String,
    pub reachable_nodes: Vec<ReachableNode>,
    pub total_reachable: usize,
    pub crown_jewels_reachable: usize,
    pub blast_score: f64,
}

/// A node reachable from the compromised node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReachableNode {
    pub node_id: String,
    pub name: String,
    pub hops: usize,
    pub cumulative_difficulty: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_request_tagged_by_type() {
        let request: SimulationRequest = serde_json::from_str(
            r#"{"type": "ADD_CONTROL", "asset_id": "db-01", "control": "REQUIRE_AUTH"}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            SimulationRequest::AddControl {
                asset_id: "db-01".to_string(),
                control: ControlType::RequireAuth,
            }
        );
        assert_eq!(request.kind(), "ADD_CONTROL");
    }

    #[test]
    fn scope_defaults_to_full() {
        assert_eq!(GraphScope::default(), GraphScope::Full);
        let zone: GraphScope = serde_json::from_str(r#"{"kind": "zone", "zone": "dmz"}"#).unwrap();
        assert_eq!(
            zone,
            GraphScope::Zone {
                zone: "dmz".to_string()
            }
        );
    }

    #[test]
    fn graph_status_display_matches_serde() {
        let json = serde_json::to_string(&GraphStatus::Computing).unwrap();
        assert_eq!(json, format!("\"{}\"", GraphStatus::Computing));
    }
}
