//! In-memory graph representation for pathfinding algorithms.
//!
//! Nodes and edges live in flat vectors addressed by dense index; the
//! adjacency list holds edge indices sorted by target id so every traversal
//! visits neighbors in the same order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use sentinel_core::types::{
    AssetType, Criticality, EdgeDirection, EdgeType, ImpactTier, Protocol, TrustLevel,
    VulnerabilityFinding, VulnSeverity,
};

/// Aggregated vulnerability signals for one node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VulnerabilitySummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub known_exploited: usize,
    pub max_cvss: f64,
    pub max_exploit_probability: f64,
    pub cve_ids: Vec<String>,
}

impl VulnerabilitySummary {
    pub fn from_findings(findings: &[VulnerabilityFinding]) -> Self {
        let mut summary = Self {
            total: findings.len(),
            ..Self::default()
        };
        for finding in findings {
            match finding.severity {
                VulnSeverity::Critical => summary.critical += 1,
                VulnSeverity::High => summary.high += 1,
                _ => {}
            }
            if finding.known_exploited {
                summary.known_exploited += 1;
            }
            summary.max_cvss = summary.max_cvss.max(finding.cvss_score.unwrap_or(0.0));
            summary.max_exploit_probability = summary
                .max_exploit_probability
                .max(finding.exploit_probability.clamp(0.0, 1.0));
            summary.cve_ids.push(finding.cve_id.clone());
        }
        summary.cve_ids.sort();
        summary.cve_ids.dedup();
        summary
    }
}

/// Node metadata stored in the in-memory graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Dense index (0..N-1) for O(1) lookup.
    pub index: usize,
    /// Asset id from the snapshot.
    pub id: String,
    pub name: String,
    pub asset_type: AssetType,
    pub criticality: Criticality,
    pub business_impact: Option<ImpactTier>,
    pub zone: Option<String>,
    pub trust_level: TrustLevel,
    pub is_entry_point: bool,
    pub is_crown_jewel: bool,
    /// Raw findings, kept so a patch simulation can remove individual CVEs.
    pub findings: Vec<VulnerabilityFinding>,
    pub vulnerabilities: VulnerabilitySummary,
    /// Highest risk score of any path through this node.
    pub risk_score: f64,
}

/// Directed edge. A bidirectional connection is stored as two edges that
/// both carry `EdgeDirection::Bidirectional`.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub index: usize,
    /// `"{source}->{target}:{type}"`.
    pub id: String,
    pub source: usize,
    pub target: usize,
    pub edge_type: EdgeType,
    pub direction: EdgeDirection,
    pub protocol: Option<Protocol>,
    pub port: Option<u16>,
    pub requires_auth: bool,
    pub mfa: bool,
    /// Declared through an `admin_access` list.
    pub admin: bool,
    /// Multiplier applied by simulated controls (1.0 when none).
    pub control_factor: f64,
    /// Difficulty before vulnerability enrichment.
    pub base_difficulty: f64,
    /// Difficulty after enrichment. Lower = easier to traverse.
    pub traversal_difficulty: f64,
}

impl GraphEdge {
    pub fn make_id(source: &str, target: &str, edge_type: EdgeType) -> String {
        format!("{source}->{target}:{edge_type}")
    }
}

/// The in-memory graph for pathfinding algorithms.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    /// All nodes, indexed by dense index.
    pub nodes: Vec<GraphNode>,
    /// All edges, indexed by dense index.
    pub edges: Vec<GraphEdge>,
    /// `adjacency[i]` = indices of edges leaving node `i`.
    pub adjacency: Vec<Vec<usize>>,
    /// Map from asset id → dense index.
    pub node_index: HashMap<String, usize>,
}

impl InMemoryGraph {
    /// Assemble a graph from nodes and edges, re-indexing edges densely.
    pub fn from_parts(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        let node_index = nodes.iter().map(|n| (n.id.clone(), n.index)).collect();
        let mut graph = Self {
            nodes,
            edges,
            adjacency: Vec::new(),
            node_index,
        };
        graph.rebuild_adjacency();
        graph
    }

    /// Recompute edge indices and the sorted adjacency list. Must be called
    /// after edges are added or removed.
    pub fn rebuild_adjacency(&mut self) {
        for (i, edge) in self.edges.iter_mut().enumerate() {
            edge.index = i;
        }

        let mut adjacency = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            adjacency[edge.source].push(edge.index);
        }
        for list in &mut adjacency {
            list.sort_by(|&a, &b| {
                let (ea, eb) = (&self.edges[a], &self.edges[b]);
                self.nodes[ea.target]
                    .id
                    .cmp(&self.nodes[eb.target].id)
                    .then(ea.edge_type.cmp(&eb.edge_type))
            });
        }
        self.adjacency = adjacency;
    }

    /// Get all entry point node indices.
    pub fn entry_points(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.is_entry_point)
            .map(|n| n.index)
            .collect()
    }

    /// Get all crown jewel node indices.
    pub fn crown_jewels(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.is_crown_jewel)
            .map(|n| n.index)
            .collect()
    }

    pub fn index_of(&self, asset_id: &str) -> Option<usize> {
        self.node_index.get(asset_id).copied()
    }

    /// Outgoing edges of a node, in deterministic order.
    pub fn outgoing(&self, node: usize) -> impl Iterator<Item = &GraphEdge> {
        self.adjacency[node].iter().map(move |&e| &self.edges[e])
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
