//! CLI entry point for the sentinel-pathfind attack path engine.
//!
//! Reads an input document (assets, designations, vulnerabilities) from
//! `--input` or stdin, computes the attack graph, and writes a JSON result
//! to stdout. Logs go to stderr.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use sentinel_core::types::{AssetSnapshot, TenantId, VulnerabilityFinding, VulnerabilityIndex};
use sentinel_pathfind::fetch::{StaticAssetSource, StaticVulnerabilityFeed};
use sentinel_pathfind::types::{GraphScope, GraphStatus, PathFilter, SimulationRequest};
use sentinel_pathfind::{AttackGraphService, PathfindConfig, PathfindEngine};

#[derive(Parser)]
#[command(name = "sentinel-pathfind")]
#[command(about = "Attack path analysis: entry points to crown jewels, chokepoints, what-if simulation")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Input document path. Reads stdin when omitted.
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Override tenant ID.
    #[arg(long, global = true)]
    tenant_id: Option<String>,

    /// Config file prefix (default: sentinel).
    #[arg(short, long, default_value = "sentinel", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the graph and print its summary and ranked paths.
    Compute {
        /// Only print paths at or above this risk score.
        #[arg(long)]
        min_risk: Option<f64>,
    },
    /// Print the top chokepoints.
    Chokepoints {
        /// Number of chokepoints (default from config).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run a what-if simulation given as JSON, e.g.
    /// '{"type":"PATCH_VULNERABILITY","cve_ids":["CVE-2024-3400"]}'.
    Simulate {
        #[arg(long)]
        request: String,
    },
    /// Easiest route between two assets.
    Shortest {
        /// Source asset ID.
        #[arg(long)]
        source: String,
        /// Target asset ID.
        #[arg(long)]
        target: String,
    },
    /// Assets reachable from a compromised asset.
    BlastRadius {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        max_hops: Option<usize>,
    },
    /// Print flat node/edge/path records.
    Export,
}

/// Input document: an asset snapshot plus findings by asset id.
#[derive(Deserialize)]
struct InputDocument {
    #[serde(flatten)]
    snapshot: AssetSnapshot,
    #[serde(default)]
    vulnerabilities: HashMap<String, Vec<VulnerabilityFinding>>,
    #[serde(default)]
    scope: GraphScope,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let config: PathfindConfig = sentinel_core::config::load_section(&cli.config, "pathfind")?;
    let engine = PathfindEngine::new(config)?;

    let document = read_input(cli.input.as_ref())?;
    let tenant_id = resolve_tenant_id(&cli)?;
    let vulnerabilities = VulnerabilityIndex {
        findings: document.vulnerabilities,
        synced_at: None,
    };

    let service = AttackGraphService::new(
        engine,
        Arc::new(StaticAssetSource::with_snapshot(tenant_id, document.snapshot)),
        Arc::new(StaticVulnerabilityFeed::with_index(tenant_id, vulnerabilities)),
    );

    let summary = service.compute_graph(tenant_id, document.scope).await;
    let summary = service.wait_for_graph(summary.id).await?;
    if summary.status == GraphStatus::Error {
        anyhow::bail!(
            "Graph computation failed: {}",
            summary.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    let graph_id = summary.id;

    match cli.command {
        Command::Compute { min_risk } => {
            let filter = PathFilter {
                min_risk_score: min_risk,
                status: None,
            };
            let paths = service.list_paths(graph_id, &filter).await?;
            let output = serde_json::json!({ "graph": summary, "paths": paths });
            println!("{}", serde_json::to_string(&output)?);
        }
        Command::Chokepoints { limit } => {
            let result = service.top_chokepoints(graph_id, limit).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Simulate { ref request } => {
            let request: SimulationRequest =
                serde_json::from_str(request).context("Invalid simulation request")?;
            let result = service.run_simulation(graph_id, request).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Shortest {
            ref source,
            ref target,
        } => {
            let result = service.shortest_path(graph_id, source, target).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::BlastRadius {
            ref asset,
            max_hops,
        } => {
            let result = service.blast_radius(graph_id, asset, max_hops).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Export => {
            let result = service.export_graph(graph_id).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<InputDocument> {
    let input = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    serde_json::from_str(&input).context("Invalid input document")
}

fn resolve_tenant_id(cli: &Cli) -> anyhow::Result<TenantId> {
    match cli.tenant_id.as_deref() {
        Some(raw) => Ok(TenantId(uuid::Uuid::parse_str(raw)?)),
        None => Ok(TenantId::new()),
    }
}
