//! sentinel-pathfind: Attack path analysis for the Sentinel platform.
//!
//! Builds a directed graph from a tenant's asset snapshot, enriches it with
//! vulnerability findings, enumerates the cheapest attacker routes from entry
//! points to crown jewels, scores them, ranks chokepoints, and evaluates
//! what-if simulations against private clones of the graph.

pub mod algorithms;
pub mod blast;
pub mod builder;
pub mod chokepoint;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod lateral;
pub mod persist;
pub mod scoring;
pub mod service;
pub mod simulation;
pub mod store;
pub mod types;

pub use algorithms::CancelFlag;
pub use config::PathfindConfig;
pub use error::{BuildError, PathfindError};
pub use service::AttackGraphService;
pub use types::{
    AttackPath, BlastRadiusResult, Chokepoint, GraphScope, GraphStatus, GraphSummary,
    SimulationRequest, SimulationResult,
};

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use sentinel_core::types::{AssetRecord, VulnerabilityFinding};
use sentinel_core::{AssetSnapshot, GraphId, VulnerabilityIndex};

use crate::algorithms::{RawPath, SearchBounds};
use crate::error::Result;
use crate::graph::InMemoryGraph;
use crate::simulation::Mutation;
use crate::types::{AttackStep, GraphStats, PathStatus};

/// Namespace for content-derived path ids.
const PATH_NAMESPACE: Uuid = Uuid::from_u128(0x5e7a_41c2_9b3d_4f08_a6e1_2d94_c7b0_83f5);

/// Output of one full computation.
#[derive(Debug, Clone)]
pub struct ComputedGraph {
    pub graph: InMemoryGraph,
    /// Ranked by risk.
    pub paths: Vec<AttackPath>,
    pub stats: GraphStats,
    pub fingerprint: String,
}

/// Paths found by one enumeration + scoring pass.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub paths: Vec<AttackPath>,
    pub unreachable_pairs: usize,
}

/// The main attack path computation engine.
///
/// Holds configuration and the bounded worker pool used by enumeration.
/// All methods are synchronous and CPU-bound; the service runs them on the
/// blocking pool.
pub struct PathfindEngine {
    config: PathfindConfig,
    pool: rayon::ThreadPool,
}

impl PathfindEngine {
    pub fn new(config: PathfindConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.enumeration.worker_threads)
            .thread_name(|i| format!("pathfind-{i}"))
            .build()?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &PathfindConfig {
        &self.config
    }

    /// Build → enrich → enumerate → score.
    pub fn compute(
        &self,
        snapshot: &AssetSnapshot,
        vulnerabilities: &VulnerabilityIndex,
        scope: &GraphScope,
        cancel: &CancelFlag,
    ) -> Result<ComputedGraph> {
        let (mut graph, build) = builder::build_graph(snapshot, scope, &self.config.difficulty)?;
        let enrichment = enrich::enrich_graph(&mut graph, vulnerabilities, &self.config.difficulty);

        let entry_point_count = graph.entry_points().len();
        let crown_jewel_count = graph.crown_jewels().len();
        if entry_point_count == 0 || crown_jewel_count == 0 {
            tracing::warn!(
                entry_points = entry_point_count,
                crown_jewels = crown_jewel_count,
                "Graph has no entry point or no crown jewel in scope; no paths to enumerate"
            );
        }

        let analysis = self.analyze(&mut graph, &[], cancel)?;

        let stats = GraphStats {
            total_nodes: graph.node_count(),
            total_edges: graph.edge_count(),
            entry_point_count,
            crown_jewel_count,
            path_count: analysis.paths.len(),
            dropped_edges: build.dropped_edges,
            self_loops: build.self_loops,
            duplicate_edges: build.duplicate_edges,
            excluded_designations: build.excluded_designations,
            enrichment_gaps: enrichment.enrichment_gaps,
            unreachable_pairs: analysis.unreachable_pairs,
        };

        Ok(ComputedGraph {
            graph,
            paths: analysis.paths,
            stats,
            fingerprint: fingerprint(snapshot, vulnerabilities)?,
        })
    }

    /// Enumerate and score every (entry point, crown jewel) pair, then set
    /// each node's `risk_score` to the highest risk of any path through it.
    pub fn analyze(
        &self,
        graph: &mut InMemoryGraph,
        extra_entries: &[usize],
        cancel: &CancelFlag,
    ) -> Result<Analysis> {
        let mut entries = graph.entry_points();
        entries.extend_from_slice(extra_entries);
        let pairs = algorithms::cross_pairs(graph, &entries, &graph.crown_jewels());

        let bounds = SearchBounds {
            max_hops: self.config.enumeration.max_hops,
            paths_per_pair: self.config.enumeration.paths_per_pair,
        };
        let outcomes = algorithms::enumerate_paths(graph, &self.pool, &pairs, bounds, cancel)?;

        let unreachable_pairs = outcomes.iter().filter(|o| o.paths.is_empty()).count();
        let mut paths: Vec<AttackPath> = outcomes
            .iter()
            .flat_map(|o| o.paths.iter())
            .map(|raw| self.to_attack_path(graph, raw))
            .collect();
        scoring::rank_paths(&mut paths);

        for node in &mut graph.nodes {
            node.risk_score = 0.0;
        }
        for path in &paths {
            for id in &path.node_ids {
                if let Some(i) = graph.index_of(id) {
                    let node = &mut graph.nodes[i];
                    node.risk_score = node.risk_score.max(path.risk_score);
                }
            }
        }

        tracing::debug!(
            pairs = pairs.len(),
            paths = paths.len(),
            unreachable_pairs,
            "Enumeration finished"
        );

        Ok(Analysis {
            paths,
            unreachable_pairs,
        })
    }

    /// Rank chokepoints, defaulting the limit from config.
    pub fn top_chokepoints(
        &self,
        graph: &InMemoryGraph,
        paths: &[AttackPath],
        limit: Option<usize>,
    ) -> Vec<Chokepoint> {
        let limit = limit.unwrap_or(self.config.chokepoint.default_limit);
        chokepoint::top_chokepoints(graph, paths, limit, &self.config.chokepoint)
    }

    /// Run a what-if simulation on a clone of `graph`.
    pub fn simulate(
        &self,
        graph_id: GraphId,
        graph: &InMemoryGraph,
        paths: &[AttackPath],
        request: &SimulationRequest,
        cancel: &CancelFlag,
    ) -> Result<SimulationResult> {
        let mut clone = graph.clone();
        let mutation = simulation::apply_mutation(&mut clone, request, &self.config.difficulty);

        let (after, blast_radius, no_op_reason) = match mutation {
            Mutation::NoOp { reason } => (paths.to_vec(), None, Some(reason)),
            Mutation::Applied { touched } => {
                tracing::debug!(%graph_id, kind = request.kind(), touched, "Simulation mutation applied");
                (self.analyze(&mut clone, &[], cancel)?.paths, None, None)
            }
            Mutation::ExtraEntry { node } => {
                let blast = blast::compute_blast_radius(
                    &clone,
                    node,
                    self.config.enumeration.max_hops,
                );
                let after = self.analyze(&mut clone, &[node], cancel)?.paths;
                (after, Some(blast), None)
            }
        };

        let diff = simulation::diff_paths(paths, &after);
        let no_op = no_op_reason.is_some();
        let recommendation = match no_op_reason {
            Some(reason) => format!("{reason}; the simulation has no effect."),
            None => simulation::recommendation(request, &diff, blast_radius.as_ref()),
        };

        Ok(SimulationResult {
            id: Uuid::new_v4(),
            graph_id,
            request: request.clone(),
            paths_before: diff.paths_before,
            paths_after: diff.paths_after,
            paths_eliminated: diff.eliminated.len(),
            paths_introduced: diff.introduced,
            eliminated_path_ids: diff.eliminated,
            risk_before: diff.risk_before,
            risk_after: diff.risk_after,
            risk_reduction_percent: diff.risk_reduction_percent,
            no_op,
            recommendation,
            blast_radius,
            completed_at: Utc::now(),
            error_message: None,
        })
    }

    /// The easiest route between two assets by cumulative traversal
    /// difficulty, regardless of designations.
    pub fn shortest_path(
        &self,
        graph: &InMemoryGraph,
        source_id: &str,
        target_id: &str,
    ) -> Result<Option<AttackPath>> {
        let source = node_index(graph, source_id)?;
        let target = node_index(graph, target_id)?;
        Ok(algorithms::shortest_weighted_path(graph, source, target)
            .map(|raw| self.to_attack_path(graph, &raw)))
    }

    /// Assets reachable from `asset_id` within `max_hops` (default: the
    /// enumeration hop cap).
    pub fn blast_radius(
        &self,
        graph: &InMemoryGraph,
        asset_id: &str,
        max_hops: Option<usize>,
    ) -> Result<BlastRadiusResult> {
        let node = node_index(graph, asset_id)?;
        let max_hops = max_hops.unwrap_or(self.config.enumeration.max_hops);
        Ok(blast::compute_blast_radius(graph, node, max_hops))
    }

    /// Convert a `RawPath` into a scored `AttackPath`.
    fn to_attack_path(&self, graph: &InMemoryGraph, raw: &RawPath) -> AttackPath {
        let scores = scoring::score_path(graph, raw, &self.config.scoring);
        let node_ids: Vec<String> = raw
            .node_indices
            .iter()
            .map(|&i| graph.nodes[i].id.clone())
            .collect();

        let steps: Vec<AttackStep> = raw
            .edges
            .iter()
            .map(|&e| {
                let edge = &graph.edges[e];
                AttackStep {
                    from_id: graph.nodes[edge.source].id.clone(),
                    to_id: graph.nodes[edge.target].id.clone(),
                    edge_id: edge.id.clone(),
                    edge_type: edge.edge_type,
                    technique: lateral::detect_technique(edge).to_string(),
                    description: lateral::describe_step(graph, edge),
                    requires_auth: edge.requires_auth,
                    traversal_difficulty: edge.traversal_difficulty,
                }
            })
            .collect();

        AttackPath {
            id: path_id(&node_ids),
            source_id: node_ids.first().cloned().unwrap_or_default(),
            target_id: node_ids.last().cloned().unwrap_or_default(),
            edge_ids: steps.iter().map(|s| s.edge_id.clone()).collect(),
            hop_count: raw.hop_count(),
            total_difficulty: raw.total_difficulty,
            exploitability_score: scores.exploitability,
            impact_score: scores.impact,
            risk_score: scores.risk,
            status: PathStatus::Open,
            node_ids,
            steps,
        }
    }
}

/// Content-derived path id: identical node sequences get identical ids
/// across recomputations and simulation clones.
pub fn path_id(node_ids: &[String]) -> Uuid {
    Uuid::new_v5(&PATH_NAMESPACE, node_ids.join("->").as_bytes())
}

fn node_index(graph: &InMemoryGraph, asset_id: &str) -> Result<usize> {
    graph
        .index_of(asset_id)
        .ok_or_else(|| PathfindError::NodeNotFound {
            node_id: asset_id.to_string(),
        })
}

/// Hashable view of a computation's input. Timestamps are left out so two
/// byte-identical inventories synced at different times hash the same.
#[derive(Serialize)]
struct HashableInput<'a> {
    assets: &'a [AssetRecord],
    entry_points: &'a [String],
    crown_jewels: &'a [String],
    findings: BTreeMap<&'a str, &'a [VulnerabilityFinding]>,
}

/// BLAKE3 hex digest of the snapshot and vulnerability index.
pub fn fingerprint(snapshot: &AssetSnapshot, vulnerabilities: &VulnerabilityIndex) -> Result<String> {
    let hashable = HashableInput {
        assets: &snapshot.assets,
        entry_points: &snapshot.entry_points,
        crown_jewels: &snapshot.crown_jewels,
        findings: vulnerabilities
            .findings
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect(),
    };
    let json = serde_json::to_vec(&hashable)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::types::{Connection, Criticality, TrustLevel, VulnSeverity};

    use crate::types::AssetFilter;

    fn engine() -> PathfindEngine {
        let mut config = PathfindConfig::default();
        config.enumeration.worker_threads = 2;
        PathfindEngine::new(config).unwrap()
    }

    /// web (entry) → app → db (jewel), plus web → db over authenticated SSH.
    fn snapshot() -> AssetSnapshot {
        let mut web = AssetRecord::new("web");
        web.trust_level = TrustLevel::Untrusted;
        let mut app = AssetRecord::new("app");
        app.inbound.push(Connection::to("web"));
        let mut db = AssetRecord::new("db");
        db.criticality = Criticality::Critical;
        db.inbound.push(Connection::to("app"));
        let mut ssh = Connection::to("db");
        ssh.requires_auth = true;
        ssh.protocol = Some(sentinel_core::types::Protocol::Ssh);
        web.outbound.push(ssh);

        AssetSnapshot {
            assets: vec![web, app, db],
            entry_points: vec!["web".to_string()],
            crown_jewels: vec!["db".to_string()],
            captured_at: Utc::now(),
        }
    }

    fn kev_index() -> VulnerabilityIndex {
        let mut index = VulnerabilityIndex::default();
        index.findings.insert(
            "app".to_string(),
            vec![VulnerabilityFinding {
                cve_id: "CVE-2023-4966".to_string(),
                cvss_score: Some(9.4),
                severity: VulnSeverity::Critical,
                exploit_probability: 0.95,
                known_exploited: true,
            }],
        );
        index
    }

    #[test]
    fn test_compute_end_to_end() {
        let computed = engine()
            .compute(&snapshot(), &kev_index(), &GraphScope::Full, &CancelFlag::default())
            .unwrap();

        assert_eq!(computed.stats.total_nodes, 3);
        assert_eq!(computed.stats.path_count, 2);
        assert_eq!(computed.stats.enrichment_gaps, 2);
        for path in &computed.paths {
            assert_eq!(path.source_id, "web");
            assert_eq!(path.target_id, "db");
            assert_eq!(path.steps.len(), path.hop_count);
        }
        assert!(computed.paths[0].risk_score >= computed.paths[1].risk_score);

        let ssh = computed.paths.iter().find(|p| p.hop_count == 1).unwrap();
        assert_eq!(ssh.steps[0].technique, "ssh-pivot");
        let indirect = computed.paths.iter().find(|p| p.hop_count == 2).unwrap();
        assert!(indirect.steps.iter().all(|s| !s.technique.is_empty()));
    }

    #[test]
    fn test_build_anomalies_reported_in_stats() {
        let mut snap = snapshot();
        snap.assets[1].outbound.push(Connection::to("db"));
        snap.assets[2].outbound.push(Connection::to("db"));
        snap.assets[0].outbound.push(Connection::to("jump"));
        snap.assets.push(AssetRecord::new("jump"));
        snap.entry_points.push("jump".to_string());
        let scope = GraphScope::Custom {
            filter: AssetFilter {
                asset_ids: vec!["web".to_string(), "app".to_string(), "db".to_string()],
                ..AssetFilter::default()
            },
        };

        let computed = engine()
            .compute(&snap, &kev_index(), &scope, &CancelFlag::default())
            .unwrap();

        assert_eq!(computed.stats.duplicate_edges, 1);
        assert_eq!(computed.stats.self_loops, 1);
        assert_eq!(computed.stats.dropped_edges, 1);
        assert_eq!(computed.stats.excluded_designations, 1);
        assert_eq!(computed.stats.total_edges, 3);
    }

    #[test]
    fn test_path_ids_are_content_derived() {
        let e = engine();
        let a = e
            .compute(&snapshot(), &kev_index(), &GraphScope::Full, &CancelFlag::default())
            .unwrap();
        let b = e
            .compute(&snapshot(), &kev_index(), &GraphScope::Full, &CancelFlag::default())
            .unwrap();
        assert_eq!(a.paths, b.paths);
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_fingerprint_ignores_capture_time_but_not_content() {
        let first = snapshot();
        let mut later = snapshot();
        later.captured_at = first.captured_at + chrono::Duration::hours(1);
        let index = kev_index();
        assert_eq!(
            fingerprint(&first, &index).unwrap(),
            fingerprint(&later, &index).unwrap()
        );

        later.crown_jewels.push("app".to_string());
        assert_ne!(
            fingerprint(&first, &index).unwrap(),
            fingerprint(&later, &index).unwrap()
        );
    }

    #[test]
    fn test_node_risk_is_max_of_paths() {
        let computed = engine()
            .compute(&snapshot(), &kev_index(), &GraphScope::Full, &CancelFlag::default())
            .unwrap();
        let top = computed.paths[0].risk_score;
        let db = computed.graph.index_of("db").unwrap();
        assert!((computed.graph.nodes[db].risk_score - top).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_asset_lookups() {
        let e = engine();
        let computed = e
            .compute(&snapshot(), &kev_index(), &GraphScope::Full, &CancelFlag::default())
            .unwrap();
        assert!(matches!(
            e.shortest_path(&computed.graph, "web", "ghost"),
            Err(PathfindError::NodeNotFound { .. })
        ));
        assert!(matches!(
            e.blast_radius(&computed.graph, "ghost", None),
            Err(PathfindError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_simulation_never_mutates_original() {
        let e = engine();
        let computed = e
            .compute(&snapshot(), &kev_index(), &GraphScope::Full, &CancelFlag::default())
            .unwrap();
        let difficulties: Vec<f64> = computed
            .graph
            .edges
            .iter()
            .map(|edge| edge.traversal_difficulty)
            .collect();

        let request = SimulationRequest::PatchVulnerability {
            cve_ids: vec!["CVE-2023-4966".to_string()],
        };
        let result = e
            .simulate(
                GraphId::new(),
                &computed.graph,
                &computed.paths,
                &request,
                &CancelFlag::default(),
            )
            .unwrap();
        assert!(!result.no_op);
        assert!(result.risk_after <= result.risk_before);

        let after: Vec<f64> = computed
            .graph
            .edges
            .iter()
            .map(|edge| edge.traversal_difficulty)
            .collect();
        assert_eq!(difficulties, after);
    }
}
