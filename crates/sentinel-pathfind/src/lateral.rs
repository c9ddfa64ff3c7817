//! Lateral movement technique labels for attack steps.
//!
//! A label is derived from the edge type plus the declared protocol or
//! well-known port of the connection.

use sentinel_core::types::{EdgeType, Protocol};

use crate::graph::{GraphEdge, InMemoryGraph};

const SSH_PORT: u16 = 22;
const RDP_PORT: u16 = 3389;

/// The technique an attacker would use to cross `edge`.
pub fn detect_technique(edge: &GraphEdge) -> &'static str {
    match edge.edge_type {
        EdgeType::Trust => "trust-exploitation",
        EdgeType::Access => remote_shell(edge).unwrap_or("credential-access"),
        EdgeType::Network => remote_shell(edge).unwrap_or("network-pivot"),
    }
}

/// Human-readable summary of one step.
pub fn describe_step(graph: &InMemoryGraph, edge: &GraphEdge) -> String {
    let from = &graph.nodes[edge.source].name;
    let to = &graph.nodes[edge.target].name;
    match (&edge.protocol, edge.port) {
        (Some(protocol), Some(port)) => {
            format!("{from} -> {to} via {} ({protocol}/{port})", edge.edge_type)
        }
        (Some(protocol), None) => format!("{from} -> {to} via {} ({protocol})", edge.edge_type),
        (None, Some(port)) => format!("{from} -> {to} via {} (port {port})", edge.edge_type),
        (None, None) => format!("{from} -> {to} via {}", edge.edge_type),
    }
}

fn remote_shell(edge: &GraphEdge) -> Option<&'static str> {
    match (&edge.protocol, edge.port) {
        (Some(Protocol::Ssh), _) | (_, Some(SSH_PORT)) => Some("ssh-pivot"),
        (Some(Protocol::Rdp), _) | (_, Some(RDP_PORT)) => Some("rdp-hop"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::{diamond, edge};

    #[test]
    fn test_detect_technique_ssh() {
        let mut e = edge(0, 1, 1.0);
        e.edge_type = EdgeType::Access;
        e.protocol = Some(Protocol::Ssh);
        assert_eq!(detect_technique(&e), "ssh-pivot");
    }

    #[test]
    fn test_detect_technique_rdp_by_port() {
        let mut e = edge(0, 1, 1.0);
        e.port = Some(3389);
        assert_eq!(detect_technique(&e), "rdp-hop");
    }

    #[test]
    fn test_detect_technique_trust() {
        let mut e = edge(0, 1, 1.0);
        e.edge_type = EdgeType::Trust;
        e.port = Some(22);
        assert_eq!(detect_technique(&e), "trust-exploitation");
    }

    #[test]
    fn test_detect_technique_defaults() {
        let mut e = edge(0, 1, 1.0);
        assert_eq!(detect_technique(&e), "network-pivot");
        e.edge_type = EdgeType::Access;
        assert_eq!(detect_technique(&e), "credential-access");
    }

    #[test]
    fn test_describe_step() {
        let graph = diamond();
        let mut e = graph.edges[0].clone();
        assert_eq!(describe_step(&graph, &e), "n0 -> n1 via NETWORK");
        e.protocol = Some(Protocol::Https);
        e.port = Some(443);
        assert_eq!(describe_step(&graph, &e), "n0 -> n1 via NETWORK (https/443)");
    }
}
