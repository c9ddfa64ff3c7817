//! What-if simulation.
//!
//! A simulation mutates a private clone of the graph, re-runs enumeration
//! and scoring on it, and diffs the new path set against the original by
//! path id. The stored graph is never touched.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use sentinel_core::types::EdgeType;
use sentinel_core::GraphId;

use crate::builder::rederive_base_difficulties;
use crate::config::DifficultyConfig;
use crate::enrich;
use crate::graph::InMemoryGraph;
use crate::scoring::total_risk;
use crate::types::{
    AttackPath, BlastRadiusResult, ControlType, SimulationRequest, SimulationResult,
};

/// What a mutation did to the cloned graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Edges or findings changed; `touched` counts them.
    Applied { touched: usize },
    /// Re-run enumeration with this node as an extra entry point.
    ExtraEntry { node: usize },
    /// Nothing in the graph matched the request.
    NoOp { reason: String },
}

/// Apply `request` to `graph` in place. Callers pass a clone.
pub fn apply_mutation(
    graph: &mut InMemoryGraph,
    request: &SimulationRequest,
    config: &DifficultyConfig,
) -> Mutation {
    match request {
        SimulationRequest::PatchVulnerability { cve_ids } => patch(graph, cve_ids, config),
        SimulationRequest::SegmentNetwork { asset_id, new_zone } => {
            segment(graph, asset_id, new_zone, config)
        }
        SimulationRequest::AddControl { asset_id, control } => {
            add_control(graph, asset_id, *control, config)
        }
        SimulationRequest::RemoveAccess {
            asset_id,
            principal_id,
        } => remove_access(graph, asset_id, principal_id.as_deref()),
        SimulationRequest::CompromiseAsset { asset_id } => match graph.index_of(asset_id) {
            Some(node) => Mutation::ExtraEntry { node },
            None => unknown_asset(asset_id),
        },
    }
}

fn patch(graph: &mut InMemoryGraph, cve_ids: &[String], config: &DifficultyConfig) -> Mutation {
    let patched: HashSet<&str> = cve_ids.iter().map(String::as_str).collect();
    let mut removed = 0;
    for node in &mut graph.nodes {
        let before = node.findings.len();
        node.findings.retain(|f| !patched.contains(f.cve_id.as_str()));
        removed += before - node.findings.len();
    }

    if removed == 0 {
        return Mutation::NoOp {
            reason: format!(
                "None of {} is present on any asset in this graph",
                cve_ids.join(", ")
            ),
        };
    }
    enrich::reapply(graph, config);
    Mutation::Applied { touched: removed }
}

fn segment(
    graph: &mut InMemoryGraph,
    asset_id: &str,
    new_zone: &str,
    config: &DifficultyConfig,
) -> Mutation {
    let Some(node) = graph.index_of(asset_id) else {
        return unknown_asset(asset_id);
    };
    if graph.nodes[node].zone.as_deref() == Some(new_zone) {
        return Mutation::NoOp {
            reason: format!("Asset {asset_id} is already in zone {new_zone}"),
        };
    }

    graph.nodes[node].zone = Some(new_zone.to_string());
    rederive_base_difficulties(graph, config);
    enrich::reapply(graph, config);

    let touched = touching(graph, node)
        .filter(|&e| graph.edges[e].edge_type == EdgeType::Network)
        .count();
    Mutation::Applied { touched }
}

fn add_control(
    graph: &mut InMemoryGraph,
    asset_id: &str,
    control: ControlType,
    config: &DifficultyConfig,
) -> Mutation {
    let Some(node) = graph.index_of(asset_id) else {
        return unknown_asset(asset_id);
    };

    let edges: Vec<usize> = touching(graph, node).collect();
    let mut touched = 0;
    for e in edges {
        let edge = &mut graph.edges[e];
        let changed = match control {
            ControlType::RequireAuth => !std::mem::replace(&mut edge.requires_auth, true),
            ControlType::Mfa => {
                edge.requires_auth = true;
                !std::mem::replace(&mut edge.mfa, true)
            }
            ControlType::Edr => {
                edge.control_factor *= config.edr_factor;
                true
            }
            ControlType::Firewall if edge.edge_type == EdgeType::Network => {
                edge.control_factor *= config.firewall_factor;
                true
            }
            ControlType::Firewall => false,
        };
        if changed {
            touched += 1;
        }
    }

    if touched == 0 {
        return Mutation::NoOp {
            reason: format!(
                "{} is already in effect on every connection of {asset_id}",
                control_label(control)
            ),
        };
    }
    rederive_base_difficulties(graph, config);
    enrich::reapply(graph, config);
    Mutation::Applied { touched }
}

fn remove_access(graph: &mut InMemoryGraph, asset_id: &str, principal_id: Option<&str>) -> Mutation {
    let Some(node) = graph.index_of(asset_id) else {
        return unknown_asset(asset_id);
    };
    let principal = match principal_id {
        Some(id) => match graph.index_of(id) {
            Some(p) => Some(p),
            None => return unknown_asset(id),
        },
        None => None,
    };

    let before = graph.edges.len();
    graph.edges.retain(|e| {
        let revoked = e.target == node
            && e.edge_type == EdgeType::Access
            && principal.map_or(true, |p| e.source == p);
        !revoked
    });
    let removed = before - graph.edges.len();

    if removed == 0 {
        return Mutation::NoOp {
            reason: match principal_id {
                Some(p) => format!("{p} holds no access to {asset_id}"),
                None => format!("No principal holds access to {asset_id}"),
            },
        };
    }
    graph.rebuild_adjacency();
    Mutation::Applied { touched: removed }
}

/// Edge indices leaving or entering `node`.
fn touching(graph: &InMemoryGraph, node: usize) -> impl Iterator<Item = usize> + '_ {
    graph
        .edges
        .iter()
        .filter(move |e| e.source == node || e.target == node)
        .map(|e| e.index)
}

fn unknown_asset(asset_id: &str) -> Mutation {
    Mutation::NoOp {
        reason: format!("Asset {asset_id} is not part of this graph"),
    }
}

fn control_label(control: ControlType) -> &'static str {
    match control {
        ControlType::RequireAuth => "Authentication",
        ControlType::Mfa => "MFA",
        ControlType::Edr => "EDR",
        ControlType::Firewall => "Firewall filtering",
    }
}

/// Path-set comparison between the original graph and its mutated clone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathDiff {
    pub paths_before: usize,
    pub paths_after: usize,
    pub eliminated: Vec<Uuid>,
    pub introduced: usize,
    pub risk_before: f64,
    pub risk_after: f64,
    pub risk_reduction_percent: f64,
}

/// Diff two path sets by id.
pub fn diff_paths(before: &[AttackPath], after: &[AttackPath]) -> PathDiff {
    let before_ids: HashSet<Uuid> = before.iter().map(|p| p.id).collect();
    let after_ids: HashSet<Uuid> = after.iter().map(|p| p.id).collect();

    let risk_before = total_risk(before);
    let risk_after = total_risk(after);
    let risk_reduction_percent = if risk_before > 0.0 {
        (1.0 - risk_after / risk_before).max(0.0) * 100.0
    } else {
        0.0
    };

    PathDiff {
        paths_before: before.len(),
        paths_after: after.len(),
        eliminated: before
            .iter()
            .filter(|p| !after_ids.contains(&p.id))
            .map(|p| p.id)
            .collect(),
        introduced: after.iter().filter(|p| !before_ids.contains(&p.id)).count(),
        risk_before,
        risk_after,
        risk_reduction_percent,
    }
}

/// Result recorded for a simulation that did not finish.
pub fn failed_result(
    graph_id: GraphId,
    request: SimulationRequest,
    paths: &[AttackPath],
    message: String,
) -> SimulationResult {
    let diff = diff_paths(paths, paths);
    SimulationResult {
        id: Uuid::new_v4(),
        graph_id,
        recommendation: format!("{} simulation did not complete: {message}", request.kind()),
        request,
        paths_before: diff.paths_before,
        paths_after: diff.paths_after,
        paths_eliminated: 0,
        paths_introduced: 0,
        eliminated_path_ids: Vec::new(),
        risk_before: diff.risk_before,
        risk_after: diff.risk_after,
        risk_reduction_percent: 0.0,
        no_op: false,
        blast_radius: None,
        completed_at: Utc::now(),
        error_message: Some(message),
    }
}

/// Summary sentence for a completed simulation.
pub fn recommendation(
    request: &SimulationRequest,
    diff: &PathDiff,
    blast: Option<&BlastRadiusResult>,
) -> String {
    let action = match request {
        SimulationRequest::PatchVulnerability { cve_ids } => format!("Patching {}", cve_ids.join(", ")),
        SimulationRequest::SegmentNetwork { asset_id, new_zone } => {
            format!("Moving {asset_id} to zone {new_zone}")
        }
        SimulationRequest::AddControl { asset_id, control } => {
            format!("Adding {} on {asset_id}", control_label(*control))
        }
        SimulationRequest::RemoveAccess {
            asset_id,
            principal_id: Some(p),
        } => format!("Revoking access from {p} to {asset_id}"),
        SimulationRequest::RemoveAccess { asset_id, .. } => format!("Revoking access to {asset_id}"),
        SimulationRequest::CompromiseAsset { asset_id } => {
            return compromise_recommendation(asset_id, diff, blast);
        }
    };

    if diff.eliminated.is_empty() && diff.risk_reduction_percent <= 0.0 {
        return format!(
            "{action} does not reduce attack path risk. Consider a control on a top chokepoint instead."
        );
    }

    let priority = if diff.risk_reduction_percent >= 50.0 {
        " Prioritize this remediation."
    } else if diff.risk_reduction_percent >= 20.0 {
        " Worth scheduling."
    } else {
        ""
    };
    format!(
        "{action} eliminates {} of {} attack path(s) and reduces total path risk by {:.1}%.{priority}",
        diff.eliminated.len(),
        diff.paths_before,
        diff.risk_reduction_percent,
    )
}

fn compromise_recommendation(
    asset_id: &str,
    diff: &PathDiff,
    blast: Option<&BlastRadiusResult>,
) -> String {
    let mut text = format!(
        "Assuming {asset_id} is compromised exposes {} additional attack path(s)",
        diff.introduced
    );
    if let Some(blast) = blast {
        text.push_str(&format!(
            " and puts {} asset(s), {} of them crown jewels, within reach",
            blast.total_reachable, blast.crown_jewels_reachable
        ));
    }
    text.push_str(if diff.introduced > 0 {
        ". Harden or isolate this asset."
    } else {
        ". Existing entry points already cover its reach."
    });
    text
}
