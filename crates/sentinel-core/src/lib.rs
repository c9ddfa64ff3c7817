//! sentinel-core: Shared types, configuration, and error handling for the Sentinel platform.
//!
//! This crate provides the foundational types used by the attack path engine:
//! - Asset records and declared connections from the CMDB snapshot
//! - Vulnerability findings from the vulnerability feed
//! - Event types for inter-service communication
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use error::SentinelError;
pub use types::{
    AssetRecord, AssetSnapshot, Connection, Criticality, EdgeType, GraphId, TenantId,
    VulnerabilityFinding, VulnerabilityIndex,
};
