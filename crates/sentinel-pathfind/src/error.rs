//! Error types for the sentinel-pathfind crate.
//!
//! Only fatal conditions are errors. Dropped edges, enrichment gaps, pairs
//! without a route, and no-op simulations are reported through counters and
//! flags instead.

use sentinel_core::GraphId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathfindError {
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Computation timeout: exceeded {max_seconds}s limit")]
    Timeout { max_seconds: u64 },

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Graph not found: {graph_id}")]
    GraphNotFound { graph_id: GraphId },

    #[error("Graph {graph_id} is not queryable (status: {status})")]
    GraphNotReady { graph_id: GraphId, status: String },

    #[error("Graph {graph_id} is already computing")]
    AlreadyComputing { graph_id: GraphId },

    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    #[error("Path not found: {path_id}")]
    PathNotFound { path_id: uuid::Uuid },

    #[error("Source error: {0}")]
    Source(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Malformed asset or relationship input, rejected at the builder boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Asset at position {position} has an empty id")]
    MissingAssetId { position: usize },

    #[error("Duplicate asset id: {asset_id}")]
    DuplicateAssetId { asset_id: String },

    #[error("Connection on asset {asset_id} has an empty target id")]
    MissingConnectionTarget { asset_id: String },

    #[error("{designation} designation references unknown asset {asset_id}")]
    UnknownDesignation {
        designation: &'static str,
        asset_id: String,
    },

    #[error("Invalid scope filter: {reason}")]
    InvalidScope { reason: String },
}

pub type Result<T> = std::result::Result<T, PathfindError>;
