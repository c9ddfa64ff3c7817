//! Vulnerability enrichment.
//!
//! Attaches findings from an explicitly supplied [`VulnerabilityIndex`] to
//! every node, then lowers the traversal difficulty of each edge in
//! proportion to how exploitable its target is. A node missing from the
//! index is treated as having no known vulnerabilities.

use sentinel_core::VulnerabilityIndex;

use crate::config::DifficultyConfig;
use crate::graph::{GraphNode, InMemoryGraph, VulnerabilitySummary};

/// Non-fatal gaps observed during enrichment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentReport {
    pub enriched_nodes: usize,
    /// Nodes the vulnerability index had no entry for.
    pub enrichment_gaps: usize,
    pub known_exploited_nodes: usize,
}

/// Populate node findings from the index and apply exploitability to edges.
pub fn enrich_graph(
    graph: &mut InMemoryGraph,
    index: &VulnerabilityIndex,
    config: &DifficultyConfig,
) -> EnrichmentReport {
    let mut report = EnrichmentReport::default();

    for node in &mut graph.nodes {
        match index.lookup(&node.id) {
            Some(findings) => {
                node.findings = findings.to_vec();
                report.enriched_nodes += 1;
            }
            None => {
                node.findings.clear();
                report.enrichment_gaps += 1;
            }
        }
        node.vulnerabilities = VulnerabilitySummary::from_findings(&node.findings);
        if node.vulnerabilities.known_exploited > 0 {
            report.known_exploited_nodes += 1;
        }
    }

    apply_exploitability(graph, config);

    if report.enrichment_gaps > 0 {
        tracing::debug!(
            gaps = report.enrichment_gaps,
            "Nodes without vulnerability data default to zero exploitability"
        );
    }

    report
}

/// Re-summarize node findings and recompute `traversal_difficulty` from
/// `base_difficulty`. Used after a simulation edits findings or edges.
pub fn reapply(graph: &mut InMemoryGraph, config: &DifficultyConfig) {
    for node in &mut graph.nodes {
        node.vulnerabilities = VulnerabilitySummary::from_findings(&node.findings);
    }
    apply_exploitability(graph, config);
}

fn apply_exploitability(graph: &mut InMemoryGraph, config: &DifficultyConfig) {
    let signals: Vec<f64> = graph
        .nodes
        .iter()
        .map(|n| exploit_signal(n, config))
        .collect();

    for edge in &mut graph.edges {
        let reduction = config.exploit_reduction_cap.clamp(0.0, 1.0) * signals[edge.target];
        edge.traversal_difficulty = (edge.base_difficulty * (1.0 - reduction)).max(0.0);
    }
}

/// How exploitable a node is, in `[0.0, 1.0]`.
///
/// The strongest of: exploit probability, the known-exploited floor, and
/// normalized CVSS scaled by `cvss_signal_weight`.
pub fn exploit_signal(node: &GraphNode, config: &DifficultyConfig) -> f64 {
    let v = &node.vulnerabilities;
    let kev = if v.known_exploited > 0 {
        config.kev_signal_floor
    } else {
        0.0
    };
    let cvss = (v.max_cvss / 10.0) * config.cvss_signal_weight;
    v.max_exploit_probability.max(kev).max(cvss).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::types::{VulnSeverity, VulnerabilityFinding};

    use crate::graph::fixtures::diamond;

    fn kev_finding(cve: &str) -> VulnerabilityFinding {
        VulnerabilityFinding {
            cve_id: cve.to_string(),
            cvss_score: Some(9.8),
            severity: VulnSeverity::Critical,
            exploit_probability: 0.3,
            known_exploited: true,
        }
    }

    #[test]
    fn test_missing_entries_are_gaps_not_errors() {
        let mut graph = diamond();
        let config = DifficultyConfig::default();
        let report = enrich_graph(&mut graph, &VulnerabilityIndex::default(), &config);

        assert_eq!(report.enrichment_gaps, 4);
        assert_eq!(report.enriched_nodes, 0);
        for edge in &graph.edges {
            assert!((edge.traversal_difficulty - edge.base_difficulty).abs() < 1e-12);
        }
    }

    #[test]
    fn test_known_exploited_target_lowers_inbound_difficulty() {
        let mut graph = diamond();
        let config = DifficultyConfig::default();
        let mut index = VulnerabilityIndex::default();
        index
            .findings
            .insert("n3".to_string(), vec![kev_finding("CVE-2024-3400")]);

        let report = enrich_graph(&mut graph, &index, &config);
        assert_eq!(report.known_exploited_nodes, 1);

        let factor = 1.0 - config.exploit_reduction_cap * config.kev_signal_floor;
        for edge in &graph.edges {
            if edge.target == 3 {
                assert!((edge.traversal_difficulty - edge.base_difficulty * factor).abs() < 1e-12);
            } else {
                assert!((edge.traversal_difficulty - edge.base_difficulty).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_reapply_after_patch_restores_difficulty() {
        let mut graph = diamond();
        let config = DifficultyConfig::default();
        let mut index = VulnerabilityIndex::default();
        index
            .findings
            .insert("n1".to_string(), vec![kev_finding("CVE-2023-4966")]);
        enrich_graph(&mut graph, &index, &config);

        graph.nodes[1].findings.clear();
        reapply(&mut graph, &config);

        assert_eq!(graph.nodes[1].vulnerabilities.total, 0);
        let e = graph.edges.iter().find(|e| e.target == 1).unwrap();
        assert!((e.traversal_difficulty - e.base_difficulty).abs() < 1e-12);
    }

    #[test]
    fn test_exploit_signal_uses_strongest_input() {
        let mut graph = diamond();
        let config = DifficultyConfig::default();
        graph.nodes[2].vulnerabilities.max_cvss = 8.0;
        graph.nodes[2].vulnerabilities.max_exploit_probability = 0.1;
        let signal = exploit_signal(&graph.nodes[2], &config);
        assert!((signal - 0.4).abs() < 1e-12);
    }
}
