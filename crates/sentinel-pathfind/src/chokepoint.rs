//! Chokepoint analysis.
//!
//! One pass over the path set counts, for every interior node, how many
//! paths cross it and how much risk those paths carry. Entry points and
//! targets are never counted for their own paths.

use std::collections::HashMap;

use crate::config::ChokepointConfig;
use crate::graph::InMemoryGraph;
use crate::types::{AttackPath, Chokepoint};

#[derive(Debug, Default)]
struct Tally {
    paths: usize,
    risk: f64,
}

/// Rank interior nodes by how much of the path set they cover.
///
/// `priority = risk_share × 10 × risk / total_risk + coverage_share × 10 × paths / total_paths`.
/// Sorted by priority descending, then `paths_affected` descending, then node id.
pub fn top_chokepoints(
    graph: &InMemoryGraph,
    paths: &[AttackPath],
    limit: usize,
    config: &ChokepointConfig,
) -> Vec<Chokepoint> {
    if paths.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut tallies: HashMap<&str, Tally> = HashMap::new();
    for path in paths {
        let n = path.node_ids.len();
        if n < 3 {
            continue;
        }
        for node_id in &path.node_ids[1..n - 1] {
            let tally = tallies.entry(node_id.as_str()).or_default();
            tally.paths += 1;
            tally.risk += path.risk_score;
        }
    }

    let total_paths = paths.len() as f64;
    let total_risk: f64 = paths.iter().map(|p| p.risk_score).sum();

    let mut ranked: Vec<Chokepoint> = tallies
        .into_iter()
        .filter_map(|(node_id, tally)| {
            let node = &graph.nodes[graph.index_of(node_id)?];
            let risk_ratio = if total_risk > 0.0 {
                tally.risk / total_risk
            } else {
                0.0
            };
            let coverage_ratio = tally.paths as f64 / total_paths;
            Some(Chokepoint {
                node_id: node.id.clone(),
                name: node.name.clone(),
                asset_type: node.asset_type,
                paths_affected: tally.paths,
                total_risk_mitigated: tally.risk,
                priority_score: config.risk_share * risk_ratio * 10.0
                    + config.coverage_share * coverage_ratio * 10.0,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then(b.paths_affected.cmp(&a.paths_affected))
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::graph::fixtures::node;
    use crate::types::PathStatus;

    fn path(nodes: &[&str], risk: f64) -> AttackPath {
        AttackPath {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, nodes.join("/").as_bytes()),
            source_id: nodes[0].to_string(),
            target_id: nodes[nodes.len() - 1].to_string(),
            node_ids: nodes.iter().map(|s| s.to_string()).collect(),
            edge_ids: Vec::new(),
            steps: Vec::new(),
            hop_count: nodes.len() - 1,
            total_difficulty: 0.0,
            exploitability_score: 0.0,
            impact_score: 0.0,
            risk_score: risk,
            status: PathStatus::Open,
        }
    }

    fn graph(ids: &[&str]) -> InMemoryGraph {
        let nodes = ids.iter().enumerate().map(|(i, id)| node(i, id)).collect();
        InMemoryGraph::from_parts(nodes, Vec::new())
    }

    #[test]
    fn test_shared_intermediate_counts_both_paths() {
        let g = graph(&["e1", "e2", "j", "m"]);
        let paths = vec![path(&["e1", "m", "j"], 8.0), path(&["e2", "m", "j"], 6.0)];

        let ranked = top_chokepoints(&g, &paths, 10, &ChokepointConfig::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].node_id, "m");
        assert_eq!(ranked[0].paths_affected, 2);
        assert!((ranked[0].total_risk_mitigated - 14.0).abs() < 1e-9);
        // Covers every path and all the risk.
        assert!((ranked[0].priority_score - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_endpoints_never_counted() {
        let g = graph(&["e", "j"]);
        let paths = vec![path(&["e", "j"], 9.0)];
        assert!(top_chokepoints(&g, &paths, 10, &ChokepointConfig::default()).is_empty());
    }

    #[test]
    fn test_ranking_and_truncation() {
        let g = graph(&["a", "b", "c", "e", "j"]);
        let paths = vec![
            path(&["e", "a", "b", "j"], 9.0),
            path(&["e", "a", "c", "j"], 5.0),
            path(&["e", "c", "j"], 4.0),
        ];

        let config = ChokepointConfig::default();
        let ranked = top_chokepoints(&g, &paths, 10, &config);
        let ids: Vec<&str> = ranked.iter().map(|c| c.node_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);

        let top_two = top_chokepoints(&g, &paths, 2, &config);
        assert_eq!(top_two.len(), 2);
        let sum_top: usize = top_two.iter().map(|c| c.paths_affected).sum();
        let sum_all: usize = ranked.iter().map(|c| c.paths_affected).sum();
        assert!(sum_top <= sum_all);
    }

    #[test]
    fn test_equal_priority_breaks_on_node_id() {
        let g = graph(&["e", "j", "x", "y"]);
        let paths = vec![path(&["e", "y", "j"], 5.0), path(&["e", "x", "j"], 5.0)];
        let ranked = top_chokepoints(&g, &paths, 10, &ChokepointConfig::default());
        assert_eq!(ranked[0].node_id, "x");
        assert_eq!(ranked[1].node_id, "y");
    }

    #[test]
    fn test_zero_risk_paths_still_ranked_by_coverage() {
        let g = graph(&["e", "j", "m"]);
        let paths = vec![path(&["e", "m", "j"], 0.0)];
        let ranked = top_chokepoints(&g, &paths, 10, &ChokepointConfig::default());
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].priority_score - 4.0).abs() < 1e-9);
    }
}
