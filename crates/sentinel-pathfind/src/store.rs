//! Graph registry.
//!
//! Tracks every graph's lifecycle (`COMPUTING → READY | ERROR`), its last
//! successful result, path triage statuses and simulation history. Each
//! graph carries a `watch` channel so callers can await a terminal status.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use sentinel_core::{GraphId, TenantId};

use crate::config::RegistryConfig;
use crate::error::{PathfindError, Result};
use crate::graph::InMemoryGraph;
use crate::types::{
    AttackPath, GraphScope, GraphStats, GraphStatus, GraphSummary, PathStatus, SimulationResult,
};
use crate::ComputedGraph;

/// A READY graph's data, detached from the registry lock.
#[derive(Debug, Clone)]
pub struct ReadyGraph {
    pub tenant_id: TenantId,
    pub computed_at: DateTime<Utc>,
    pub graph: Arc<InMemoryGraph>,
    /// Ranked paths with triage statuses applied.
    pub paths: Vec<AttackPath>,
}

struct GraphRecord {
    id: GraphId,
    tenant_id: TenantId,
    scope: GraphScope,
    status: GraphStatus,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    computed_at: Option<DateTime<Utc>>,
    computation_ms: Option<u64>,
    fingerprint: Option<String>,
    stats: Option<GraphStats>,
    graph: Option<Arc<InMemoryGraph>>,
    paths: Arc<Vec<AttackPath>>,
    /// Survives refresh: path ids are content-derived.
    path_status: HashMap<Uuid, PathStatus>,
    simulations: Vec<SimulationResult>,
    status_tx: watch::Sender<GraphStatus>,
}

impl GraphRecord {
    fn summary(&self) -> GraphSummary {
        GraphSummary {
            id: self.id,
            tenant_id: self.tenant_id,
            scope: self.scope.clone(),
            status: self.status,
            error_message: self.error_message.clone(),
            stats: self.stats.clone(),
            created_at: self.created_at,
            computed_at: self.computed_at,
            computation_ms: self.computation_ms,
            input_fingerprint: self.fingerprint.clone(),
        }
    }

    fn set_status(&mut self, status: GraphStatus) {
        self.status = status;
        self.status_tx.send_replace(status);
    }

    fn paths_with_status(&self) -> Vec<AttackPath> {
        self.paths
            .iter()
            .cloned()
            .map(|mut p| {
                p.status = self.path_status.get(&p.id).copied().unwrap_or_default();
                p
            })
            .collect()
    }
}

/// In-memory registry of graphs across tenants.
#[derive(Clone)]
pub struct GraphStore {
    records: Arc<RwLock<HashMap<GraphId, GraphRecord>>>,
    max_simulations: usize,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(&RegistryConfig::default())
    }
}

impl GraphStore {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            records: Arc::default(),
            max_simulations: config.max_simulation_history,
        }
    }

    /// Register a new graph in `COMPUTING`.
    pub async fn create(&self, tenant_id: TenantId, scope: GraphScope) -> GraphSummary {
        let (status_tx, _) = watch::channel(GraphStatus::Computing);
        let record = GraphRecord {
            id: GraphId::new(),
            tenant_id,
            scope,
            status: GraphStatus::Computing,
            error_message: None,
            created_at: Utc::now(),
            computed_at: None,
            computation_ms: None,
            fingerprint: None,
            stats: None,
            graph: None,
            paths: Arc::new(Vec::new()),
            path_status: HashMap::new(),
            simulations: Vec::new(),
            status_tx,
        };
        let summary = record.summary();
        self.records.write().await.insert(record.id, record);
        summary
    }

    /// Move a graph back to `COMPUTING`. Rejected if it already is.
    pub async fn begin_refresh(&self, id: GraphId) -> Result<GraphSummary> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or(PathfindError::GraphNotFound { graph_id: id })?;
        if record.status == GraphStatus::Computing {
            return Err(PathfindError::AlreadyComputing { graph_id: id });
        }
        record.error_message = None;
        record.set_status(GraphStatus::Computing);
        Ok(record.summary())
    }

    /// Publish a finished computation and mark the graph `READY`.
    pub async fn complete(
        &self,
        id: GraphId,
        computed: ComputedGraph,
        computation_ms: u64,
    ) -> Result<GraphSummary> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or(PathfindError::GraphNotFound { graph_id: id })?;

        // Drop statuses of paths that no longer exist.
        record
            .path_status
            .retain(|path_id, _| computed.paths.iter().any(|p| p.id == *path_id));

        record.computed_at = Some(Utc::now());
        record.computation_ms = Some(computation_ms);
        record.fingerprint = Some(computed.fingerprint);
        record.stats = Some(computed.stats);
        record.graph = Some(Arc::new(computed.graph));
        record.paths = Arc::new(computed.paths);
        record.error_message = None;
        record.set_status(GraphStatus::Ready);
        Ok(record.summary())
    }

    /// Mark the graph `ERROR` and discard any previous result.
    pub async fn fail(&self, id: GraphId, message: String) -> Result<GraphSummary> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or(PathfindError::GraphNotFound { graph_id: id })?;
        record.error_message = Some(message);
        record.stats = None;
        record.graph = None;
        record.paths = Arc::new(Vec::new());
        record.set_status(GraphStatus::Error);
        Ok(record.summary())
    }

    /// Drop a graph with its paths, triage statuses and simulation history.
    /// Status watchers see the channel close.
    pub async fn remove(&self, id: GraphId) -> Result<GraphSummary> {
        self.records
            .write()
            .await
            .remove(&id)
            .map(|r| r.summary())
            .ok_or(PathfindError::GraphNotFound { graph_id: id })
    }

    /// Stored summary. `STALE` is derived by the service, not stored.
    pub async fn summary(&self, id: GraphId) -> Result<GraphSummary> {
        self.records
            .read()
            .await
            .get(&id)
            .map(GraphRecord::summary)
            .ok_or(PathfindError::GraphNotFound { graph_id: id })
    }

    /// Summaries of a tenant's graphs, oldest first.
    pub async fn list(&self, tenant_id: TenantId) -> Vec<GraphSummary> {
        let mut summaries: Vec<GraphSummary> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .map(GraphRecord::summary)
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        summaries
    }

    /// The graph's data if it is queryable.
    pub async fn ready(&self, id: GraphId) -> Result<ReadyGraph> {
        let records = self.records.read().await;
        let record = records
            .get(&id)
            .ok_or(PathfindError::GraphNotFound { graph_id: id })?;

        match (&record.graph, record.computed_at, record.status) {
            (Some(graph), Some(computed_at), GraphStatus::Ready) => Ok(ReadyGraph {
                tenant_id: record.tenant_id,
                computed_at,
                graph: Arc::clone(graph),
                paths: record.paths_with_status(),
            }),
            _ => Err(PathfindError::GraphNotReady {
                graph_id: id,
                status: record.status.to_string(),
            }),
        }
    }

    pub async fn set_path_status(&self, id: GraphId, path_id: Uuid, status: PathStatus) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or(PathfindError::GraphNotFound { graph_id: id })?;
        if !record.paths.iter().any(|p| p.id == path_id) {
            return Err(PathfindError::PathNotFound { path_id });
        }
        record.path_status.insert(path_id, status);
        Ok(())
    }

    pub async fn record_simulation(&self, id: GraphId, result: SimulationResult) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or(PathfindError::GraphNotFound { graph_id: id })?;
        record.simulations.push(result);
        let excess = record.simulations.len().saturating_sub(self.max_simulations);
        record.simulations.drain(..excess);
        Ok(())
    }

    pub async fn simulations(&self, id: GraphId) -> Result<Vec<SimulationResult>> {
        self.records
            .read()
            .await
            .get(&id)
            .map(|r| r.simulations.clone())
            .ok_or(PathfindError::GraphNotFound { graph_id: id })
    }

    /// Status updates for one graph.
    pub async fn watch(&self, id: GraphId) -> Result<watch::Receiver<GraphStatus>> {
        self.records
            .read()
            .await
            .get(&id)
            .map(|r| r.status_tx.subscribe())
            .ok_or(PathfindError::GraphNotFound { graph_id: id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::diamond;
    use crate::simulation::failed_result;
    use crate::types::SimulationRequest;

    fn computed(paths: Vec<AttackPath>) -> ComputedGraph {
        ComputedGraph {
            graph: diamond(),
            stats: GraphStats {
                path_count: paths.len(),
                ..GraphStats::default()
            },
            paths,
            fingerprint: "abc".to_string(),
        }
    }

    fn simulation(graph_id: GraphId, asset_id: &str) -> SimulationResult {
        let request = SimulationRequest::CompromiseAsset {
            asset_id: asset_id.to_string(),
        };
        failed_result(graph_id, request, &[], "timed out".to_string())
    }

    fn path(seed: &str) -> AttackPath {
        AttackPath {
            id: crate::path_id(&[seed.to_string()]),
            source_id: "n0".to_string(),
            target_id: "n3".to_string(),
            node_ids: vec!["n0".to_string(), "n3".to_string()],
            edge_ids: Vec::new(),
            steps: Vec::new(),
            hop_count: 1,
            total_difficulty: 1.0,
            exploitability_score: 1.0,
            impact_score: 1.0,
            risk_score: 1.0,
            status: PathStatus::Open,
        }
    }

    #[tokio::test]
    async fn test_lifecycle_computing_to_ready() {
        let store = GraphStore::default();
        let summary = store.create(TenantId::new(), GraphScope::Full).await;
        assert_eq!(summary.status, GraphStatus::Computing);
        assert!(matches!(
            store.ready(summary.id).await,
            Err(PathfindError::GraphNotReady { .. })
        ));

        let mut rx = store.watch(summary.id).await.unwrap();
        store.complete(summary.id, computed(vec![path("a")]), 5).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), GraphStatus::Ready);

        let ready = store.ready(summary.id).await.unwrap();
        assert_eq!(ready.paths.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_rejected_while_computing() {
        let store = GraphStore::default();
        let summary = store.create(TenantId::new(), GraphScope::Full).await;
        assert!(matches!(
            store.begin_refresh(summary.id).await,
            Err(PathfindError::AlreadyComputing { .. })
        ));

        store.complete(summary.id, computed(Vec::new()), 1).await.unwrap();
        let refreshed = store.begin_refresh(summary.id).await.unwrap();
        assert_eq!(refreshed.status, GraphStatus::Computing);
    }

    #[tokio::test]
    async fn test_path_status_survives_recompute() {
        let store = GraphStore::default();
        let summary = store.create(TenantId::new(), GraphScope::Full).await;
        let p = path("a");
        store.complete(summary.id, computed(vec![p.clone()]), 1).await.unwrap();
        store
            .set_path_status(summary.id, p.id, PathStatus::Accepted)
            .await
            .unwrap();

        store.begin_refresh(summary.id).await.unwrap();
        store
            .complete(summary.id, computed(vec![p.clone(), path("b")]), 1)
            .await
            .unwrap();

        let ready = store.ready(summary.id).await.unwrap();
        let kept = ready.paths.iter().find(|x| x.id == p.id).unwrap();
        assert_eq!(kept.status, PathStatus::Accepted);
        assert!(ready
            .paths
            .iter()
            .filter(|x| x.id != p.id)
            .all(|x| x.status == PathStatus::Open));
    }

    #[tokio::test]
    async fn test_unknown_path_status_rejected() {
        let store = GraphStore::default();
        let summary = store.create(TenantId::new(), GraphScope::Full).await;
        store.complete(summary.id, computed(Vec::new()), 1).await.unwrap();
        assert!(matches!(
            store
                .set_path_status(summary.id, Uuid::nil(), PathStatus::Mitigated)
                .await,
            Err(PathfindError::PathNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_fail_discards_previous_result() {
        let store = GraphStore::default();
        let summary = store.create(TenantId::new(), GraphScope::Full).await;
        store.complete(summary.id, computed(vec![path("a")]), 1).await.unwrap();
        store.begin_refresh(summary.id).await.unwrap();
        let failed = store
            .fail(summary.id, "Computation timeout".to_string())
            .await
            .unwrap();

        assert_eq!(failed.status, GraphStatus::Error);
        assert!(failed.stats.is_none());
        assert!(store.ready(summary.id).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_drops_graph_and_history() {
        let store = GraphStore::default();
        let tenant = TenantId::new();
        let summary = store.create(tenant, GraphScope::Full).await;
        store.complete(summary.id, computed(vec![path("a")]), 1).await.unwrap();
        store
            .record_simulation(summary.id, simulation(summary.id, "h1"))
            .await
            .unwrap();
        let mut rx = store.watch(summary.id).await.unwrap();

        let removed = store.remove(summary.id).await.unwrap();
        assert_eq!(removed.id, summary.id);
        assert!(rx.changed().await.is_err());
        assert!(store.list(tenant).await.is_empty());
        assert!(matches!(
            store.ready(summary.id).await,
            Err(PathfindError::GraphNotFound { .. })
        ));
        assert!(matches!(
            store.simulations(summary.id).await,
            Err(PathfindError::GraphNotFound { .. })
        ));
        assert!(matches!(
            store.remove(summary.id).await,
            Err(PathfindError::GraphNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_simulation_history_drops_oldest() {
        let store = GraphStore::new(&RegistryConfig {
            max_simulation_history: 2,
        });
        let summary = store.create(TenantId::new(), GraphScope::Full).await;
        store.complete(summary.id, computed(Vec::new()), 1).await.unwrap();

        for asset in ["h1", "h2", "h3"] {
            store
                .record_simulation(summary.id, simulation(summary.id, asset))
                .await
                .unwrap();
        }

        let history = store.simulations(summary.id).await.unwrap();
        let requests: Vec<SimulationRequest> = history.into_iter().map(|s| s.request).collect();
        assert_eq!(
            requests,
            vec![
                SimulationRequest::CompromiseAsset { asset_id: "h2".to_string() },
                SimulationRequest::CompromiseAsset { asset_id: "h3".to_string() },
            ]
        );
    }
}
