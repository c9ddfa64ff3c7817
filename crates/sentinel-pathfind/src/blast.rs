//! Blast radius computation.
//!
//! BFS from a compromised node over outgoing edges, bounded by hop count.
//! Tracks hop distance and the cumulative traversal difficulty along the
//! BFS tree.

use std::collections::VecDeque;

use crate::graph::InMemoryGraph;
use crate::types::{BlastRadiusResult, ReachableNode};

/// Compute the blast radius from a compromised node.
///
/// The blast score is on the same 0–10 scale as path scores: the mean over
/// all other nodes of `criticality_weight / (1 + cumulative_difficulty)`,
/// so many easy-to-reach critical assets push it toward 10.
pub fn compute_blast_radius(
    graph: &InMemoryGraph,
    compromised_node: usize,
    max_hops: usize,
) -> BlastRadiusResult {
    let mut visited = vec![false; graph.node_count()];
    visited[compromised_node] = true;

    let mut reachable = Vec::new();
    let mut crown_jewels = 0;
    let mut weighted = 0.0;

    // BFS queue: (node_index, hops, cumulative_difficulty)
    let mut queue: VecDeque<(usize, usize, f64)> = VecDeque::new();
    queue.push_back((compromised_node, 0, 0.0));

    while let Some((node, hops, cumulative)) = queue.pop_front() {
        if hops > 0 {
            let graph_node = &graph.nodes[node];
            reachable.push(ReachableNode {
                node_id: graph_node.id.clone(),
                name: graph_node.name.clone(),
                hops,
                cumulative_difficulty: cumulative,
            });
            if graph_node.is_crown_jewel {
                crown_jewels += 1;
            }
            weighted += graph_node.criticality.weight() / (1.0 + cumulative);
        }

        if hops >= max_hops {
            continue;
        }

        for edge in graph.outgoing(node) {
            if visited[edge.target] {
                continue;
            }
            visited[edge.target] = true;
            queue.push_back((edge.target, hops + 1, cumulative + edge.traversal_difficulty));
        }
    }

    // Hops ascending, then easiest first, then id.
    reachable.sort_by(|a, b| {
        a.hops
            .cmp(&b.hops)
            .then(a.cumulative_difficulty.total_cmp(&b.cumulative_difficulty))
            .then_with(|| a.node_id.cmp(&b.node_id))
    });

    let others = graph.node_count().saturating_sub(1).max(1) as f64;
    let blast_score = (10.0 * weighted / others).clamp(0.0, 10.0);

    tracing::debug!(
        compromised = %graph.nodes[compromised_node].id,
        reachable = reachable.len(),
        crown_jewels,
        "Blast radius computed"
    );

    BlastRadiusResult {
        compromised_node_id: graph.nodes[compromised_node].id.clone(),
        total_reachable: reachable.len(),
        reachable_nodes: reachable,
        crown_jewels_reachable: crown_jewels,
        blast_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::Criticality;

    use crate::graph::fixtures::{diamond, edge, node};

    /// Star topology: center (node 0) connects to 4 leaves; leaf1 is a jewel.
    fn build_star_graph() -> InMemoryGraph {
        let mut nodes = vec![node(0, "center")];
        for i in 0..4 {
            nodes.push(node(i + 1, &format!("leaf{i}")));
        }
        nodes[2].is_crown_jewel = true;
        nodes[2].criticality = Criticality::Critical;

        let difficulties = [0.8, 0.5, 0.2, 0.9];
        let edges = (0..4).map(|i| edge(0, i + 1, difficulties[i])).collect();
        InMemoryGraph::from_parts(nodes, edges)
    }

    #[test]
    fn test_blast_radius_star() {
        let graph = build_star_graph();
        let result = compute_blast_radius(&graph, 0, 5);

        assert_eq!(result.total_reachable, 4);
        assert_eq!(result.compromised_node_id, "center");
        assert_eq!(result.crown_jewels_reachable, 1);
    }

    #[test]
    fn test_blast_radius_max_hops() {
        let graph = build_star_graph();
        let result = compute_blast_radius(&graph, 0, 0);
        assert_eq!(result.total_reachable, 0);
        assert!(result.blast_score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_blast_radius_sorted_by_difficulty_within_hop() {
        let graph = build_star_graph();
        let result = compute_blast_radius(&graph, 0, 5);
        let ids: Vec<&str> = result.reachable_nodes.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids, vec!["leaf2", "leaf1", "leaf0", "leaf3"]);
    }

    #[test]
    fn test_blast_radius_follows_direction() {
        let graph = diamond();
        let from_jewel = compute_blast_radius(&graph, 3, 8);
        assert_eq!(from_jewel.total_reachable, 0);

        let from_entry = compute_blast_radius(&graph, 0, 8);
        assert_eq!(from_entry.total_reachable, 3);
        let jewel = from_entry
            .reachable_nodes
            .iter()
            .find(|r| r.node_id == "n3")
            .unwrap();
        assert_eq!(jewel.hops, 2);
        // Reached first through n1 (adjacency is id-ordered).
        assert!((jewel.cumulative_difficulty - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_blast_score_bounded() {
        let graph = build_star_graph();
        let result = compute_blast_radius(&graph, 0, 5);
        assert!(result.blast_score > 0.0);
        assert!(result.blast_score <= 10.0);
    }
}
