//! Graph builder: asset snapshot → typed node/edge graph.
//!
//! Validates the snapshot, applies the scope filter, emits one node per
//! in-scope asset and one directed edge per declared connection between two
//! in-scope assets, and derives each edge's initial traversal difficulty.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use sentinel_core::types::{
    AssetRecord, AssetSnapshot, Connection, EdgeDirection, EdgeType, TrustLevel,
};

use crate::config::DifficultyConfig;
use crate::error::BuildError;
use crate::graph::{GraphEdge, GraphNode, InMemoryGraph, VulnerabilitySummary};
use crate::types::GraphScope;

/// Non-fatal conditions absorbed while building.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// Connections referencing an asset that is unknown or out of scope.
    pub dropped_edges: usize,
    pub self_loops: usize,
    /// Connections declared more than once (e.g. on both endpoints).
    pub duplicate_edges: usize,
    pub excluded_assets: usize,
    /// Entry point / crown jewel designations on out-of-scope assets.
    pub excluded_designations: usize,
}

/// Which declaration list a connection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionList {
    Inbound,
    Outbound,
    AdminAccess,
    UserAccess,
}

/// Build the graph for `scope` from a snapshot.
pub fn build_graph(
    snapshot: &AssetSnapshot,
    scope: &GraphScope,
    config: &DifficultyConfig,
) -> Result<(InMemoryGraph, BuildReport), BuildError> {
    validate(snapshot, scope)?;

    let mut report = BuildReport::default();

    // Sort by id so node indices do not depend on snapshot order.
    let mut included: Vec<&AssetRecord> = snapshot
        .assets
        .iter()
        .filter(|a| in_scope(a, scope))
        .collect();
    included.sort_by(|a, b| a.id.cmp(&b.id));
    report.excluded_assets = snapshot.assets.len() - included.len();

    let entry_points: HashSet<&str> = snapshot.entry_points.iter().map(String::as_str).collect();
    let crown_jewels: HashSet<&str> = snapshot.crown_jewels.iter().map(String::as_str).collect();

    let nodes: Vec<GraphNode> = included
        .iter()
        .enumerate()
        .map(|(index, asset)| GraphNode {
            index,
            id: asset.id.clone(),
            name: asset.display_name().to_string(),
            asset_type: asset.asset_type,
            criticality: asset.criticality,
            business_impact: asset.business_impact,
            zone: asset.network_zone.clone(),
            trust_level: asset.trust_level,
            is_entry_point: entry_points.contains(asset.id.as_str()),
            is_crown_jewel: crown_jewels.contains(asset.id.as_str()),
            findings: Vec::new(),
            vulnerabilities: VulnerabilitySummary::default(),
            risk_score: 0.0,
        })
        .collect();

    let index: HashMap<&str, usize> = nodes
        .iter()
        .map(|n| (n.id.as_str(), n.index))
        .collect();

    report.excluded_designations = snapshot
        .entry_points
        .iter()
        .chain(snapshot.crown_jewels.iter())
        .filter(|id| !index.contains_key(id.as_str()))
        .count();

    // Keyed by (source, target, type) so duplicates collapse deterministically.
    let mut declared: BTreeMap<(usize, usize, EdgeType), GraphEdge> = BTreeMap::new();

    for asset in &included {
        let lists = [
            (ConnectionList::Inbound, &asset.inbound),
            (ConnectionList::Outbound, &asset.outbound),
            (ConnectionList::AdminAccess, &asset.admin_access),
            (ConnectionList::UserAccess, &asset.user_access),
        ];

        for (list, connections) in lists {
            for conn in connections.iter() {
                let Some(&other) = index.get(conn.asset_id.as_str()) else {
                    report.dropped_edges += 1;
                    tracing::warn!(
                        asset_id = %asset.id,
                        peer_id = %conn.asset_id,
                        "Dropping connection to asset outside graph scope"
                    );
                    continue;
                };
                let this = index[asset.id.as_str()];

                let (source, target) = match list {
                    ConnectionList::Outbound => (this, other),
                    _ => (other, this),
                };
                if source == target {
                    report.self_loops += 1;
                    continue;
                }

                let mut directions = vec![(source, target)];
                if conn.bidirectional {
                    directions.push((target, source));
                }

                for (s, t) in directions {
                    let mut edge = declared_edge(&nodes, s, t, list, conn);
                    edge.base_difficulty = base_difficulty(&edge, &nodes[s], &nodes[t], config);
                    edge.traversal_difficulty = edge.base_difficulty;

                    match declared.entry((s, t, edge.edge_type)) {
                        Entry::Occupied(mut slot) => {
                            report.duplicate_edges += 1;
                            // A link declared bidirectional by either endpoint stays bidirectional.
                            let bidirectional = slot.get().direction == EdgeDirection::Bidirectional
                                || edge.direction == EdgeDirection::Bidirectional;
                            if edge.base_difficulty < slot.get().base_difficulty {
                                slot.insert(edge);
                            }
                            if bidirectional {
                                slot.get_mut().direction = EdgeDirection::Bidirectional;
                            }
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(edge);
                        }
                    }
                }
            }
        }
    }

    let edges: Vec<GraphEdge> = declared.into_values().collect();
    let graph = InMemoryGraph::from_parts(nodes, edges);

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        dropped_edges = report.dropped_edges,
        self_loops = report.self_loops,
        duplicate_edges = report.duplicate_edges,
        excluded_assets = report.excluded_assets,
        excluded_designations = report.excluded_designations,
        "Built attack graph"
    );

    Ok((graph, report))
}

fn declared_edge(
    nodes: &[GraphNode],
    source: usize,
    target: usize,
    list: ConnectionList,
    conn: &Connection,
) -> GraphEdge {
    let edge_type = conn.edge_type.unwrap_or(match list {
        ConnectionList::Inbound | ConnectionList::Outbound => EdgeType::Network,
        ConnectionList::AdminAccess | ConnectionList::UserAccess => EdgeType::Access,
    });

    GraphEdge {
        index: 0,
        id: GraphEdge::make_id(&nodes[source].id, &nodes[target].id, edge_type),
        source,
        target,
        edge_type,
        direction: if conn.bidirectional {
            EdgeDirection::Bidirectional
        } else {
            EdgeDirection::Unidirectional
        },
        protocol: conn.protocol.clone(),
        port: conn.port,
        requires_auth: conn.requires_auth || conn.mfa,
        mfa: conn.mfa,
        admin: list == ConnectionList::AdminAccess,
        control_factor: 1.0,
        base_difficulty: 0.0,
        traversal_difficulty: 0.0,
    }
}

/// Difficulty of moving across `edge` before vulnerability enrichment.
pub fn base_difficulty(
    edge: &GraphEdge,
    source: &GraphNode,
    target: &GraphNode,
    config: &DifficultyConfig,
) -> f64 {
    let mut cost = match target.trust_level {
        TrustLevel::Untrusted => config.untrusted_cost,
        TrustLevel::SemiTrusted => config.semi_trusted_cost,
        TrustLevel::Trusted => config.trusted_cost,
    };

    if edge.requires_auth {
        cost += config.auth_surcharge;
    }
    if edge.mfa {
        cost += config.mfa_surcharge;
    }
    if edge.edge_type == EdgeType::Network {
        if let (Some(a), Some(b)) = (&source.zone, &target.zone) {
            if a != b {
                cost += config.zone_crossing_penalty;
            }
        }
    }

    if edge.admin {
        cost *= config.admin_access_factor;
    }
    if edge.edge_type == EdgeType::Trust {
        cost *= config.trust_edge_factor;
    }

    (cost * edge.control_factor).max(0.0)
}

/// Recompute every edge's base difficulty from current node/edge state.
pub fn rederive_base_difficulties(graph: &mut InMemoryGraph, config: &DifficultyConfig) {
    for i in 0..graph.edges.len() {
        let edge = &graph.edges[i];
        let cost = base_difficulty(edge, &graph.nodes[edge.source], &graph.nodes[edge.target], config);
        graph.edges[i].base_difficulty = cost;
    }
}

fn in_scope(asset: &AssetRecord, scope: &GraphScope) -> bool {
    match scope {
        GraphScope::Full => true,
        GraphScope::Zone { zone } => asset.network_zone.as_deref() == Some(zone.as_str()),
        GraphScope::Custom { filter } => {
            let zone_ok = filter.zones.is_empty()
                || asset
                    .network_zone
                    .as_ref()
                    .is_some_and(|z| filter.zones.contains(z));
            let type_ok =
                filter.asset_types.is_empty() || filter.asset_types.contains(&asset.asset_type);
            let crit_ok = filter
                .min_criticality
                .map_or(true, |min| asset.criticality >= min);
            let id_ok = filter.asset_ids.is_empty() || filter.asset_ids.contains(&asset.id);
            zone_ok && type_ok && crit_ok && id_ok
        }
    }
}

fn validate(snapshot: &AssetSnapshot, scope: &GraphScope) -> Result<(), BuildError> {
    if let GraphScope::Custom { filter } = scope {
        if filter.is_empty() {
            return Err(BuildError::InvalidScope {
                reason: "custom filter sets no criteria".to_string(),
            });
        }
    }

    let mut seen = HashSet::with_capacity(snapshot.assets.len());
    for (position, asset) in snapshot.assets.iter().enumerate() {
        if asset.id.trim().is_empty() {
            return Err(BuildError::MissingAssetId { position });
        }
        if !seen.insert(asset.id.as_str()) {
            return Err(BuildError::DuplicateAssetId {
                asset_id: asset.id.clone(),
            });
        }
        let has_blank_target = asset
            .inbound
            .iter()
            .chain(&asset.outbound)
            .chain(&asset.admin_access)
            .chain(&asset.user_access)
            .any(|c| c.asset_id.trim().is_empty());
        if has_blank_target {
            return Err(BuildError::MissingConnectionTarget {
                asset_id: asset.id.clone(),
            });
        }
    }

    let designations = snapshot
        .entry_points
        .iter()
        .map(|id| ("Entry point", id))
        .chain(snapshot.crown_jewels.iter().map(|id| ("Crown jewel", id)));
    for (designation, asset_id) in designations {
        if !seen.contains(asset_id.as_str()) {
            return Err(BuildError::UnknownDesignation {
                designation,
                asset_id: asset_id.clone(),
            });
        }
    }

    Ok(())
}
