//! Flat record format handed to the storage collaborator.
//!
//! Nodes and edges are arrays of flat records; a path is its ordered node
//! ids, its edge ids and its three scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sentinel_core::types::{AssetType, Criticality, EdgeDirection, EdgeType, Protocol};
use sentinel_core::{GraphId, TenantId};

use crate::graph::{InMemoryGraph, VulnerabilitySummary};
use crate::types::{AttackPath, PathStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedGraph {
    pub graph_id: GraphId,
    pub tenant_id: TenantId,
    pub computed_at: DateTime<Utc>,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub paths: Vec<PathRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub criticality: Criticality,
    pub zone: Option<String>,
    pub is_entry_point: bool,
    pub is_crown_jewel: bool,
    pub vulnerabilities: VulnerabilitySummary,
    pub risk_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub direction: EdgeDirection,
    pub protocol: Option<Protocol>,
    pub requires_auth: bool,
    pub traversal_difficulty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathRecord {
    pub id: Uuid,
    pub node_ids: Vec<String>,
    pub edge_ids: Vec<String>,
    pub hop_count: usize,
    pub exploitability_score: f64,
    pub impact_score: f64,
    pub risk_score: f64,
    pub status: PathStatus,
}

impl PersistedGraph {
    pub fn new(
        graph_id: GraphId,
        tenant_id: TenantId,
        computed_at: DateTime<Utc>,
        graph: &InMemoryGraph,
        paths: &[AttackPath],
    ) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|n| NodeRecord {
                id: n.id.clone(),
                name: n.name.clone(),
                asset_type: n.asset_type,
                criticality: n.criticality,
                zone: n.zone.clone(),
                is_entry_point: n.is_entry_point,
                is_crown_jewel: n.is_crown_jewel,
                vulnerabilities: n.vulnerabilities.clone(),
                risk_score: n.risk_score,
            })
            .collect();

        let edges = graph
            .edges
            .iter()
            .map(|e| EdgeRecord {
                id: e.id.clone(),
                source: graph.nodes[e.source].id.clone(),
                target: graph.nodes[e.target].id.clone(),
                edge_type: e.edge_type,
                direction: e.direction,
                protocol: e.protocol.clone(),
                requires_auth: e.requires_auth,
                traversal_difficulty: e.traversal_difficulty,
            })
            .collect();

        let paths = paths
            .iter()
            .map(|p| PathRecord {
                id: p.id,
                node_ids: p.node_ids.clone(),
                edge_ids: p.edge_ids.clone(),
                hop_count: p.hop_count,
                exploitability_score: p.exploitability_score,
                impact_score: p.impact_score,
                risk_score: p.risk_score,
                status: p.status,
            })
            .collect();

        Self {
            graph_id,
            tenant_id,
            computed_at,
            nodes,
            edges,
            paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::diamond;

    #[test]
    fn test_flat_records_use_asset_ids() {
        let graph = diamond();
        let persisted = PersistedGraph::new(GraphId::new(), TenantId::new(), Utc::now(), &graph, &[]);

        assert_eq!(persisted.nodes.len(), 4);
        assert_eq!(persisted.edges.len(), 4);
        let first = &persisted.edges[0];
        assert_eq!(first.source, "n0");
        assert_eq!(first.target, "n1");
    }

    #[test]
    fn test_record_field_names() {
        let graph = diamond();
        let persisted = PersistedGraph::new(GraphId::new(), TenantId::new(), Utc::now(), &graph, &[]);
        let json = serde_json::to_value(&persisted).unwrap();

        let edge = &json["edges"][0];
        assert_eq!(edge["type"], "NETWORK");
        assert!(edge.get("requiresAuth").is_some());
        assert!(edge.get("traversalDifficulty").is_some());

        let node = &json["nodes"][3];
        assert_eq!(node["criticality"], "critical");
        assert!(node.get("riskScore").is_some());
        assert!(json.get("graphId").is_some());
    }
}
