//! Collaborator seams: where asset snapshots and vulnerability data come from.
//!
//! The engine never reaches into a CMDB or a vulnerability database itself.
//! Both are supplied through these traits so the service can be driven by a
//! live integration, a fixture document, or a test double.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use sentinel_core::{AssetSnapshot, TenantId, VulnerabilityIndex};

use crate::error::{PathfindError, Result};
use crate::types::GraphScope;

/// Supplies a tenant's asset inventory with entry-point and crown-jewel
/// designations.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Snapshot of the assets a graph with `scope` may cover. Implementations
    /// may return more than the scope; the builder filters.
    async fn snapshot(&self, tenant: &TenantId, scope: &GraphScope) -> Result<AssetSnapshot>;

    /// When the inventory last changed, for staleness detection.
    async fn last_synced_at(&self, tenant: &TenantId) -> Result<Option<DateTime<Utc>>>;
}

/// Supplies vulnerability findings by asset id.
#[async_trait]
pub trait VulnerabilityFeed: Send + Sync {
    /// Findings for `asset_ids`. Assets without an entry are enrichment gaps.
    async fn fetch(&self, tenant: &TenantId, asset_ids: &[String]) -> Result<VulnerabilityIndex>;

    /// When the feed last synced, for staleness detection.
    async fn last_synced_at(&self, tenant: &TenantId) -> Result<Option<DateTime<Utc>>>;
}

/// In-memory asset source keyed by tenant.
#[derive(Debug, Default)]
pub struct StaticAssetSource {
    snapshots: RwLock<HashMap<TenantId, AssetSnapshot>>,
}

impl StaticAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source serving a single tenant.
    pub fn with_snapshot(tenant: TenantId, snapshot: AssetSnapshot) -> Self {
        Self {
            snapshots: RwLock::new(HashMap::from([(tenant, snapshot)])),
        }
    }

    /// Replace a tenant's snapshot, as a CMDB sync would.
    pub async fn replace(&self, tenant: TenantId, snapshot: AssetSnapshot) {
        self.snapshots.write().await.insert(tenant, snapshot);
    }
}

#[async_trait]
impl AssetSource for StaticAssetSource {
    async fn snapshot(&self, tenant: &TenantId, _scope: &GraphScope) -> Result<AssetSnapshot> {
        self.snapshots
            .read()
            .await
            .get(tenant)
            .cloned()
            .ok_or_else(|| PathfindError::Source(format!("No asset snapshot for tenant {tenant}")))
    }

    async fn last_synced_at(&self, tenant: &TenantId) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(tenant)
            .map(|s| s.captured_at))
    }
}

/// In-memory vulnerability feed keyed by tenant. Unknown tenants get an
/// empty index.
#[derive(Debug, Default)]
pub struct StaticVulnerabilityFeed {
    indexes: RwLock<HashMap<TenantId, VulnerabilityIndex>>,
}

impl StaticVulnerabilityFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(tenant: TenantId, index: VulnerabilityIndex) -> Self {
        Self {
            indexes: RwLock::new(HashMap::from([(tenant, index)])),
        }
    }

    pub async fn replace(&self, tenant: TenantId, index: VulnerabilityIndex) {
        self.indexes.write().await.insert(tenant, index);
    }
}

#[async_trait]
impl VulnerabilityFeed for StaticVulnerabilityFeed {
    async fn fetch(&self, tenant: &TenantId, asset_ids: &[String]) -> Result<VulnerabilityIndex> {
        let indexes = self.indexes.read().await;
        let Some(index) = indexes.get(tenant) else {
            return Ok(VulnerabilityIndex::default());
        };

        let findings = asset_ids
            .iter()
            .filter_map(|id| index.findings.get(id).map(|f| (id.clone(), f.clone())))
            .collect();
        Ok(VulnerabilityIndex {
            findings,
            synced_at: index.synced_at,
        })
    }

    async fn last_synced_at(&self, tenant: &TenantId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.indexes.read().await.get(tenant).and_then(|i| i.synced_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::types::{AssetRecord, VulnSeverity, VulnerabilityFinding};

    fn snapshot() -> AssetSnapshot {
        AssetSnapshot {
            assets: vec![AssetRecord::new("web-01"), AssetRecord::new("db-01")],
            entry_points: vec!["web-01".to_string()],
            crown_jewels: vec!["db-01".to_string()],
            captured_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_static_source_unknown_tenant_errors() {
        let source = StaticAssetSource::with_snapshot(TenantId::new(), snapshot());
        let result = source.snapshot(&TenantId::new(), &GraphScope::Full).await;
        assert!(matches!(result, Err(PathfindError::Source(_))));
    }

    #[tokio::test]
    async fn test_replace_moves_sync_time_forward() {
        let tenant = TenantId::new();
        let source = StaticAssetSource::with_snapshot(tenant, snapshot());
        let first = source.last_synced_at(&tenant).await.unwrap().unwrap();

        let mut later = snapshot();
        later.captured_at = first + chrono::Duration::seconds(60);
        source.replace(tenant, later).await;

        let second = source.last_synced_at(&tenant).await.unwrap().unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_feed_filters_to_requested_assets() {
        let tenant = TenantId::new();
        let mut index = VulnerabilityIndex::default();
        for id in ["web-01", "db-01"] {
            index.findings.insert(
                id.to_string(),
                vec![VulnerabilityFinding {
                    cve_id: format!("CVE-2024-{id}"),
                    cvss_score: None,
                    severity: VulnSeverity::High,
                    exploit_probability: 0.1,
                    known_exploited: false,
                }],
            );
        }
        let feed = StaticVulnerabilityFeed::with_index(tenant, index);

        let fetched = feed.fetch(&tenant, &["db-01".to_string()]).await.unwrap();
        assert_eq!(fetched.findings.len(), 1);
        assert!(fetched.lookup("db-01").is_some());

        let other = feed.fetch(&TenantId::new(), &["db-01".to_string()]).await.unwrap();
        assert!(other.findings.is_empty());
    }
}
