//! Risk scoring engine for attack paths.
//!
//! Three scores per path, each clamped to `[0, max_score]`:
//! - exploitability from known-exploited findings, average exploit
//!   probability of the breached nodes, and the share of unauthenticated edges
//! - impact from the target's criticality and business impact tier
//! - risk as a weighted blend of both plus a hop term that decays per hop
//!
//! See [`ScoringConfig`] for the weights.

use std::cmp::Ordering;

use crate::algorithms::RawPath;
use crate::config::ScoringConfig;
use crate::graph::InMemoryGraph;
use crate::types::AttackPath;

/// Scores for a single path.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathScores {
    pub exploitability: f64,
    pub impact: f64,
    pub risk: f64,
}

/// Score an attack path.
///
/// The entry node is the attacker's foothold, so only the nodes after it
/// contribute vulnerability signals.
pub fn score_path(graph: &InMemoryGraph, path: &RawPath, config: &ScoringConfig) -> PathScores {
    let Some(&target_idx) = path.node_indices.last() else {
        return PathScores::default();
    };
    if path.edges.is_empty() {
        return PathScores::default();
    }

    let max = config.max_score;
    let breached = &path.node_indices[1..];

    let known_exploited: usize = breached
        .iter()
        .map(|&i| graph.nodes[i].vulnerabilities.known_exploited)
        .sum();
    let saturation = config.kev_saturation.max(1);
    let kev_term = known_exploited.min(saturation) as f64 / saturation as f64;

    let avg_exploit_probability = breached
        .iter()
        .map(|&i| graph.nodes[i].vulnerabilities.max_exploit_probability)
        .sum::<f64>()
        / breached.len() as f64;

    let hop_count = path.edges.len();
    let unauthenticated = path
        .edges
        .iter()
        .filter(|&&e| !graph.edges[e].requires_auth)
        .count();
    let unauth_ratio = unauthenticated as f64 / hop_count as f64;

    let exploitability = clamp_score(
        max * (config.kev_weight * kev_term
            + config.epss_weight * avg_exploit_probability
            + config.unauth_weight * unauth_ratio),
        max,
    );

    let target = &graph.nodes[target_idx];
    let criticality = target.criticality.weight();
    let tier = target
        .business_impact
        .map_or(criticality, |tier| tier.weight());
    let impact = clamp_score(
        max * (config.criticality_weight * criticality + config.impact_tier_weight * tier),
        max,
    );

    // Shorter paths score higher: 1.0 for a single hop, decaying after.
    let hop_term = config.decay_factor.powi((hop_count - 1) as i32);

    let risk = clamp_score(
        config.exploitability_share * exploitability
            + config.impact_share * impact
            + config.hop_share * max * hop_term,
        max,
    );

    PathScores {
        exploitability,
        impact,
        risk,
    }
}

/// Order paths by risk descending, then hop count ascending, then id.
pub fn rank_paths(paths: &mut [AttackPath]) {
    paths.sort_by(|a, b| {
        b.risk_score
            .total_cmp(&a.risk_score)
            .then(a.hop_count.cmp(&b.hop_count))
            .then(a.id.cmp(&b.id))
    });
}

/// Sum of risk scores, the basis for simulation risk reduction.
pub fn total_risk(paths: &[AttackPath]) -> f64 {
    paths.iter().map(|p| p.risk_score).sum()
}

fn clamp_score(value: f64, max: f64) -> f64 {
    match value.partial_cmp(&0.0) {
        Some(Ordering::Greater) => value.min(max),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::types::{Criticality, ImpactTier};

    use crate::graph::fixtures::diamond;

    fn raw(nodes: Vec<usize>, edges: Vec<usize>) -> RawPath {
        RawPath {
            node_indices: nodes,
            edges,
            total_difficulty: 0.0,
        }
    }

    /// Edge index of `source → target` in the diamond fixture.
    fn edge_of(graph: &InMemoryGraph, source: usize, target: usize) -> usize {
        graph
            .edges
            .iter()
            .find(|e| e.source == source && e.target == target)
            .unwrap()
            .index
    }

    #[test]
    fn test_scoring_known_path() {
        let mut graph = diamond();
        let config = ScoringConfig::default();
        graph.nodes[3].vulnerabilities.known_exploited = 1;
        graph.nodes[3].vulnerabilities.max_exploit_probability = 0.9;

        // 0 → 1 → 3, both edges unauthenticated.
        let path = raw(vec![0, 1, 3], vec![edge_of(&graph, 0, 1), edge_of(&graph, 1, 3)]);
        let scores = score_path(&graph, &path, &config);

        // kev_term = 1/2, avg_epss = (0 + 0.9) / 2 = 0.45, unauth_ratio = 1
        // exploitability = 10 × (0.4×0.5 + 0.3×0.45 + 0.3×1) = 6.35
        // impact = 10 × (0.7×1.0 + 0.3×1.0) = 10
        // risk = 0.35×6.35 + 0.45×10 + 0.2×10×0.85 = 2.2225 + 4.5 + 1.7 = 8.4225
        assert!((scores.exploitability - 6.35).abs() < 1e-9);
        assert!((scores.impact - 10.0).abs() < 1e-9);
        assert!((scores.risk - 8.4225).abs() < 1e-9);
    }

    #[test]
    fn test_authenticated_edges_lower_exploitability() {
        let mut graph = diamond();
        let config = ScoringConfig::default();
        let path = raw(vec![0, 1, 3], vec![edge_of(&graph, 0, 1), edge_of(&graph, 1, 3)]);
        let before = score_path(&graph, &path, &config);

        for edge in &mut graph.edges {
            edge.requires_auth = true;
        }
        let after = score_path(&graph, &path, &config);

        assert!(after.exploitability < before.exploitability);
        assert!(after.risk < before.risk);
        assert!((after.impact - before.impact).abs() < 1e-12);
    }

    #[test]
    fn test_impact_tier_overrides_criticality() {
        let mut graph = diamond();
        let config = ScoringConfig::default();
        graph.nodes[3].criticality = Criticality::High;
        graph.nodes[3].business_impact = Some(ImpactTier::Tier4);
        let path = raw(vec![0, 1, 3], vec![edge_of(&graph, 0, 1), edge_of(&graph, 1, 3)]);

        // 10 × (0.7×0.8 + 0.3×0.15) = 6.05
        let scores = score_path(&graph, &path, &config);
        assert!((scores.impact - 6.05).abs() < 1e-9);
    }

    #[test]
    fn test_longer_paths_score_lower() {
        let graph = diamond();
        let config = ScoringConfig::default();
        let two_hop = raw(vec![0, 1, 3], vec![edge_of(&graph, 0, 1), edge_of(&graph, 1, 3)]);
        let one_hop = raw(vec![1, 3], vec![edge_of(&graph, 1, 3)]);

        let long = score_path(&graph, &two_hop, &config);
        let short = score_path(&graph, &one_hop, &config);
        assert!(short.risk > long.risk);
    }

    #[test]
    fn test_scoring_empty_path() {
        let graph = diamond();
        let config = ScoringConfig::default();
        assert_eq!(score_path(&graph, &raw(vec![], vec![]), &config), PathScores::default());
        assert_eq!(score_path(&graph, &raw(vec![0], vec![]), &config), PathScores::default());
    }

    #[test]
    fn test_scores_capped_at_max() {
        let mut graph = diamond();
        let config = ScoringConfig {
            exploitability_share: 1.0,
            impact_share: 1.0,
            hop_share: 1.0,
            ..ScoringConfig::default()
        };
        graph.nodes[3].vulnerabilities.known_exploited = 5;
        graph.nodes[3].vulnerabilities.max_exploit_probability = 1.0;
        let path = raw(vec![1, 3], vec![edge_of(&graph, 1, 3)]);

        let scores = score_path(&graph, &path, &config);
        assert!(scores.risk <= 10.0);
        assert!(scores.exploitability <= 10.0);
    }
}
