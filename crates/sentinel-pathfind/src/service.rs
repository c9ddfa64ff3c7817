//! Attack graph service: the async surface consumed by API collaborators.
//!
//! `compute_graph` and `refresh_graph` return immediately with the graph in
//! `COMPUTING`; the computation runs as a background task on the blocking
//! pool under a timeout. Queries are answered only while the graph is READY.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use sentinel_core::events::{EventPayload, EventSource, SentinelEvent};
use sentinel_core::{GraphId, TenantId};

use crate::algorithms::CancelFlag;
use crate::error::{PathfindError, Result};
use crate::fetch::{AssetSource, VulnerabilityFeed};
use crate::persist::PersistedGraph;
use crate::simulation;
use crate::store::GraphStore;
use crate::types::{
    AttackPath, BlastRadiusResult, Chokepoint, GraphScope, GraphStatus, GraphSummary, PathFilter,
    PathStatus, SimulationRequest, SimulationResult,
};
use crate::{ComputedGraph, PathfindEngine};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shared handle to the engine, the graph registry and the collaborators.
/// Cheap to clone.
#[derive(Clone)]
pub struct AttackGraphService {
    engine: Arc<PathfindEngine>,
    store: GraphStore,
    assets: Arc<dyn AssetSource>,
    vulnerabilities: Arc<dyn VulnerabilityFeed>,
    events: broadcast::Sender<SentinelEvent>,
}

impl AttackGraphService {
    pub fn new(
        engine: PathfindEngine,
        assets: Arc<dyn AssetSource>,
        vulnerabilities: Arc<dyn VulnerabilityFeed>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = GraphStore::new(&engine.config().registry);
        Self {
            engine: Arc::new(engine),
            store,
            assets,
            vulnerabilities,
            events,
        }
    }

    /// Lifecycle and simulation events for all graphs.
    pub fn subscribe(&self) -> broadcast::Receiver<SentinelEvent> {
        self.events.subscribe()
    }

    /// Status updates for one graph.
    pub async fn watch_graph(&self, graph_id: GraphId) -> Result<watch::Receiver<GraphStatus>> {
        self.store.watch(graph_id).await
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    /// Register a graph in `COMPUTING` and start computing it.
    pub async fn compute_graph(&self, tenant_id: TenantId, scope: GraphScope) -> GraphSummary {
        let summary = self.store.create(tenant_id, scope.clone()).await;
        tracing::info!(graph_id = %summary.id, %tenant_id, "Graph computation requested");
        self.spawn_computation(summary.id, tenant_id, scope);
        summary
    }

    /// Recompute a graph from fresh collaborator data.
    pub async fn refresh_graph(&self, graph_id: GraphId) -> Result<GraphSummary> {
        let summary = self.store.begin_refresh(graph_id).await?;
        tracing::info!(%graph_id, tenant_id = %summary.tenant_id, "Graph refresh requested");
        self.spawn_computation(graph_id, summary.tenant_id, summary.scope.clone());
        Ok(summary)
    }

    /// Wait until the graph leaves `COMPUTING`.
    pub async fn wait_for_graph(&self, graph_id: GraphId) -> Result<GraphSummary> {
        let mut rx = self.store.watch(graph_id).await?;
        rx.wait_for(|status| *status != GraphStatus::Computing)
            .await
            .map_err(|_| PathfindError::GraphNotFound { graph_id })?;
        self.get_graph(graph_id).await
    }

    /// Current summary, reporting `STALE` when upstream data is newer than
    /// the last computation.
    pub async fn get_graph(&self, graph_id: GraphId) -> Result<GraphSummary> {
        let summary = self.store.summary(graph_id).await?;
        Ok(self.with_staleness(summary).await)
    }

    /// Drop a graph, its paths and its simulation history. A computation
    /// still running for it is discarded when it finishes.
    pub async fn remove_graph(&self, graph_id: GraphId) -> Result<()> {
        let summary = self.store.remove(graph_id).await?;
        tracing::info!(%graph_id, tenant_id = %summary.tenant_id, "Graph removed");
        Ok(())
    }

    pub async fn list_graphs(&self, tenant_id: TenantId) -> Vec<GraphSummary> {
        let mut summaries = Vec::new();
        for summary in self.store.list(tenant_id).await {
            summaries.push(self.with_staleness(summary).await);
        }
        summaries
    }

    // ── Queries ───────────────────────────────────────────────────

    /// Paths sorted by risk descending.
    pub async fn list_paths(&self, graph_id: GraphId, filter: &PathFilter) -> Result<Vec<AttackPath>> {
        let ready = self.store.ready(graph_id).await?;
        Ok(ready
            .paths
            .into_iter()
            .filter(|p| filter.min_risk_score.map_or(true, |min| p.risk_score >= min))
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .collect())
    }

    pub async fn set_path_status(
        &self,
        graph_id: GraphId,
        path_id: Uuid,
        status: PathStatus,
    ) -> Result<()> {
        self.store.set_path_status(graph_id, path_id, status).await?;
        tracing::info!(%graph_id, %path_id, ?status, "Path status updated");
        Ok(())
    }

    pub async fn top_chokepoints(&self, graph_id: GraphId, limit: Option<usize>) -> Result<Vec<Chokepoint>> {
        let ready = self.store.ready(graph_id).await?;
        Ok(self.engine.top_chokepoints(&ready.graph, &ready.paths, limit))
    }

    pub async fn shortest_path(
        &self,
        graph_id: GraphId,
        source_id: &str,
        target_id: &str,
    ) -> Result<Option<AttackPath>> {
        let ready = self.store.ready(graph_id).await?;
        self.engine.shortest_path(&ready.graph, source_id, target_id)
    }

    pub async fn blast_radius(
        &self,
        graph_id: GraphId,
        asset_id: &str,
        max_hops: Option<usize>,
    ) -> Result<BlastRadiusResult> {
        let ready = self.store.ready(graph_id).await?;
        self.engine.blast_radius(&ready.graph, asset_id, max_hops)
    }

    /// Flat node/edge/path records for the storage collaborator.
    pub async fn export_graph(&self, graph_id: GraphId) -> Result<PersistedGraph> {
        let ready = self.store.ready(graph_id).await?;
        Ok(PersistedGraph::new(
            graph_id,
            ready.tenant_id,
            ready.computed_at,
            &ready.graph,
            &ready.paths,
        ))
    }

    // ── Simulation ────────────────────────────────────────────────

    /// Evaluate a what-if mutation against a private clone of the graph and
    /// record the result in the graph's simulation history. A simulation
    /// that times out is recorded too, with `error_message` set.
    pub async fn run_simulation(
        &self,
        graph_id: GraphId,
        request: SimulationRequest,
    ) -> Result<SimulationResult> {
        let ready = Arc::new(self.store.ready(graph_id).await?);
        let tenant_id = ready.tenant_id;
        let engine = Arc::clone(&self.engine);
        let cancel = CancelFlag::default();
        let worker_cancel = cancel.clone();
        let worker_ready = Arc::clone(&ready);
        let worker_request = request.clone();

        let task = tokio::task::spawn_blocking(move || {
            engine.simulate(
                graph_id,
                &worker_ready.graph,
                &worker_ready.paths,
                &worker_request,
                &worker_cancel,
            )
        });
        let outcome = self
            .with_timeout(&cancel, async {
                task.await
                    .map_err(|e| PathfindError::Internal(format!("Simulation task failed: {e}")))?
            })
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(e @ (PathfindError::Timeout { .. } | PathfindError::Cancelled)) => {
                let message = e.to_string();
                tracing::warn!(%graph_id, kind = request.kind(), error = %message, "Simulation failed");
                let failed = simulation::failed_result(graph_id, request, &ready.paths, message);
                self.store.record_simulation(graph_id, failed.clone()).await?;
                return Ok(failed);
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            %graph_id,
            simulation_id = %result.id,
            kind = result.request.kind(),
            paths_eliminated = result.paths_eliminated,
            risk_reduction_percent = result.risk_reduction_percent,
            no_op = result.no_op,
            "Simulation completed"
        );

        self.store.record_simulation(graph_id, result.clone()).await?;
        self.publish(
            tenant_id,
            EventPayload::SimulationCompleted {
                graph_id,
                simulation_id: result.id,
                simulation_type: result.request.kind().to_string(),
                paths_eliminated: result.paths_eliminated,
                risk_reduction_percent: result.risk_reduction_percent,
            },
        );
        Ok(result)
    }

    /// Simulations run against a graph, oldest first.
    pub async fn simulations(&self, graph_id: GraphId) -> Result<Vec<SimulationResult>> {
        self.store.simulations(graph_id).await
    }

    // ── Internals ─────────────────────────────────────────────────

    fn spawn_computation(&self, graph_id: GraphId, tenant_id: TenantId, scope: GraphScope) {
        let service = self.clone();
        tokio::spawn(async move {
            service.run_computation(graph_id, tenant_id, scope).await;
        });
    }

    async fn run_computation(&self, graph_id: GraphId, tenant_id: TenantId, scope: GraphScope) {
        self.publish(tenant_id, EventPayload::GraphComputationStarted { graph_id });
        let start = Instant::now();

        let cancel = CancelFlag::default();
        let outcome = self
            .with_timeout(&cancel, self.execute(tenant_id, scope, cancel.clone()))
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(computed) => {
                let node_count = computed.stats.total_nodes;
                let edge_count = computed.stats.total_edges;
                let path_count = computed.stats.path_count;
                let top_risk_score = computed.paths.first().map_or(0.0, |p| p.risk_score);

                match self.store.complete(graph_id, computed, duration_ms).await {
                    Ok(_) => {}
                    Err(PathfindError::GraphNotFound { .. }) => {
                        tracing::debug!(%graph_id, "Graph removed before computation finished");
                        return;
                    }
                    Err(e) => {
                        tracing::error!(%graph_id, error = %e, "Failed to publish computed graph");
                        return;
                    }
                }
                tracing::info!(
                    %graph_id,
                    %tenant_id,
                    nodes = node_count,
                    edges = edge_count,
                    paths = path_count,
                    duration_ms,
                    "Graph ready"
                );
                self.publish(
                    tenant_id,
                    EventPayload::GraphComputed {
                        graph_id,
                        node_count,
                        edge_count,
                        path_count,
                        top_risk_score,
                        duration_ms,
                    },
                );
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(%graph_id, %tenant_id, error = %message, "Graph computation failed");
                match self.store.fail(graph_id, message.clone()).await {
                    Ok(_) => {}
                    Err(PathfindError::GraphNotFound { .. }) => {
                        tracing::debug!(%graph_id, "Graph removed before computation finished");
                        return;
                    }
                    Err(e) => {
                        tracing::error!(%graph_id, error = %e, "Failed to record graph failure");
                        return;
                    }
                }
                self.publish(
                    tenant_id,
                    EventPayload::GraphComputationFailed {
                        graph_id,
                        error: message,
                    },
                );
            }
        }
    }

    /// Fetch collaborator data, then run the engine on the blocking pool.
    async fn execute(
        &self,
        tenant_id: TenantId,
        scope: GraphScope,
        cancel: CancelFlag,
    ) -> Result<ComputedGraph> {
        let snapshot = self.assets.snapshot(&tenant_id, &scope).await?;
        let asset_ids: Vec<String> = snapshot.assets.iter().map(|a| a.id.clone()).collect();
        let vulnerabilities = self.vulnerabilities.fetch(&tenant_id, &asset_ids).await?;

        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.compute(&snapshot, &vulnerabilities, &scope, &cancel))
            .await
            .map_err(|e| PathfindError::Internal(format!("Computation task failed: {e}")))?
    }

    /// Run `fut` under the configured time limit. On expiry the cancel flag
    /// stops any running search and no partial result is returned.
    async fn with_timeout<T>(
        &self,
        cancel: &CancelFlag,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let max_seconds = self.engine.config().enumeration.timeout_secs;
        match tokio::time::timeout(Duration::from_secs(max_seconds), fut).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(PathfindError::Timeout { max_seconds })
            }
        }
    }

    async fn with_staleness(&self, mut summary: GraphSummary) -> GraphSummary {
        let (GraphStatus::Ready, Some(computed_at)) = (summary.status, summary.computed_at) else {
            return summary;
        };

        let assets = self.assets.last_synced_at(&summary.tenant_id).await;
        let vulns = self.vulnerabilities.last_synced_at(&summary.tenant_id).await;
        let newer = |synced: Result<Option<chrono::DateTime<chrono::Utc>>>| match synced {
            Ok(Some(at)) => at > computed_at,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(graph_id = %summary.id, error = %e, "Could not read sync time");
                false
            }
        };
        if newer(assets) || newer(vulns) {
            summary.status = GraphStatus::Stale;
        }
        summary
    }

    fn publish(&self, tenant_id: TenantId, payload: EventPayload) {
        // No subscribers is fine.
        let _ = self
            .events
            .send(SentinelEvent::new(tenant_id, EventSource::Pathfind, payload));
    }
}
