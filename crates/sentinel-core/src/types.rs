//! Core domain types consumed by the attack path engine.
//!
//! Assets, their declared connections, and vulnerability findings arrive from
//! the CMDB and vulnerability-feed collaborators in these shapes. They are
//! validated once at the graph-builder boundary and never re-parsed downstream.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Identifiers ───────────────────────────────────────────────────

/// Every graph, asset snapshot, and event belongs to a tenant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one computed attack graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub Uuid);

impl GraphId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Enums ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Server,
    Workstation,
    Database,
    Application,
    NetworkDevice,
    CloudResource,
    Identity,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Criticality {
    /// Numeric weight in `[0.0, 1.0]`.
    pub fn weight(self) -> f64 {
        match self {
            Self::Critical => 1.0,
            Self::High => 0.8,
            Self::Medium => 0.5,
            Self::Low => 0.2,
            Self::Info => 0.1,
        }
    }
}

/// Business impact tier of an asset's compromise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImpactTier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl ImpactTier {
    pub fn weight(self) -> f64 {
        match self {
            Self::Tier1 => 1.0,
            Self::Tier2 => 0.7,
            Self::Tier3 => 0.4,
            Self::Tier4 => 0.15,
        }
    }
}

/// How much the organization trusts an asset. Untrusted assets are cheap
/// to move into, trusted ones are hardened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Untrusted,
    #[default]
    SemiTrusted,
    Trusted,
}

/// The kind of relationship an edge represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Network,
    Access,
    Trust,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "NETWORK",
            Self::Access => "ACCESS",
            Self::Trust => "TRUST",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    #[default]
    Unidirectional,
    Bidirectional,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Http,
    Https,
    Ssh,
    Rdp,
    Smb,
    Dns,
    Other(String),
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
            Self::Ssh => f.write_str("ssh"),
            Self::Rdp => f.write_str("rdp"),
            Self::Smb => f.write_str("smb"),
            Self::Dns => f.write_str("dns"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VulnSeverity {
    Critical,
    High,
    Medium,
    Low,
    None,
}

// ── Asset Snapshot ────────────────────────────────────────────────

/// A declared connection from an asset's inbound/outbound/access lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    /// The asset on the other end of the connection.
    pub asset_id: String,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub mfa: bool,
    #[serde(default)]
    pub bidirectional: bool,
    /// Overrides the edge type implied by the list the connection sits in.
    #[serde(default)]
    pub edge_type: Option<EdgeType>,
}

impl Connection {
    pub fn to(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            protocol: None,
            port: None,
            requires_auth: false,
            mfa: false,
            bidirectional: false,
            edge_type: None,
        }
    }
}

/// One asset as supplied by the CMDB collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default)]
    pub criticality: Criticality,
    #[serde(default)]
    pub business_impact: Option<ImpactTier>,
    #[serde(default)]
    pub network_zone: Option<String>,
    #[serde(default)]
    pub trust_level: TrustLevel,
    /// Connections arriving at this asset: `other -> self`.
    #[serde(default)]
    pub inbound: Vec<Connection>,
    /// Connections leaving this asset: `self -> other`.
    #[serde(default)]
    pub outbound: Vec<Connection>,
    /// Principals holding administrative access to this asset.
    #[serde(default)]
    pub admin_access: Vec<Connection>,
    /// Principals holding user-level access to this asset.
    #[serde(default)]
    pub user_access: Vec<Connection>,
}

impl AssetRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            asset_type: AssetType::default(),
            criticality: Criticality::default(),
            business_impact: None,
            network_zone: None,
            trust_level: TrustLevel::default(),
            inbound: Vec::new(),
            outbound: Vec::new(),
            admin_access: Vec::new(),
            user_access: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A point-in-time export of a tenant's assets plus attacker designations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetSnapshot {
    pub assets: Vec<AssetRecord>,
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub crown_jewels: Vec<String>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

// ── Vulnerabilities ───────────────────────────────────────────────

/// A vulnerability correlated to an asset by the vulnerability feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VulnerabilityFinding {
    pub cve_id: String,
    #[serde(default)]
    pub cvss_score: Option<f64>,
    pub severity: VulnSeverity,
    /// EPSS-style probability of exploitation in `[0.0, 1.0]`.
    #[serde(default)]
    pub exploit_probability: f64,
    /// Listed in a known-exploited catalog (e.g. CISA KEV).
    #[serde(default)]
    pub known_exploited: bool,
}

/// Vulnerability findings keyed by asset id, fetched once per computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VulnerabilityIndex {
    #[serde(default)]
    pub findings: HashMap<String, Vec<VulnerabilityFinding>>,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl VulnerabilityIndex {
    pub fn lookup(&self, asset_id: &str) -> Option<&[VulnerabilityFinding]> {
        self.findings.get(asset_id).map(Vec::as_slice)
    }
}
