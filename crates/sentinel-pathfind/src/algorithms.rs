//! Core pathfinding algorithms: bounded top-K path enumeration and Dijkstra
//! shortest weighted path.
//!
//! Enumeration runs one depth-bounded DFS per (entry point, crown jewel)
//! pair. Each search keeps a per-path visited set and a fixed-capacity
//! max-heap of the K cheapest complete paths found so far; any partial path
//! whose accumulated difficulty already exceeds the K-th best is pruned.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{self, AtomicBool};
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{PathfindError, Result};
use crate::graph::InMemoryGraph;

/// How often (in node expansions) a search polls the cancel flag.
const CANCEL_POLL_INTERVAL: usize = 1024;

/// A raw path through the in-memory graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPath {
    /// Node indices along the path.
    pub node_indices: Vec<usize>,
    /// Edge indices along the path.
    pub edges: Vec<usize>,
    /// Sum of `traversal_difficulty` over the edges.
    pub total_difficulty: f64,
}

impl RawPath {
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }
}

/// Cooperative cancellation shared between a computation and its timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, atomic::Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(atomic::Ordering::Relaxed)
    }
}

/// Search limits for one enumeration.
#[derive(Debug, Clone, Copy)]
pub struct SearchBounds {
    pub max_hops: usize,
    pub paths_per_pair: usize,
}

/// The retained paths of one (entry, target) pair.
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub entry: usize,
    pub target: usize,
    /// Ascending by difficulty, ties by node-id sequence.
    pub paths: Vec<RawPath>,
}

/// Full cross product of `entries × targets`, skipping identical nodes,
/// ordered by node id so downstream merging is deterministic.
pub fn cross_pairs(graph: &InMemoryGraph, entries: &[usize], targets: &[usize]) -> Vec<(usize, usize)> {
    let mut entries = entries.to_vec();
    let mut targets = targets.to_vec();
    entries.sort_by(|&a, &b| graph.nodes[a].id.cmp(&graph.nodes[b].id));
    entries.dedup();
    targets.sort_by(|&a, &b| graph.nodes[a].id.cmp(&graph.nodes[b].id));
    targets.dedup();

    let mut pairs = Vec::with_capacity(entries.len() * targets.len());
    for &e in &entries {
        for &t in &targets {
            if e != t {
                pairs.push((e, t));
            }
        }
    }
    pairs
}

/// Enumerate paths for every pair on `pool`.
///
/// Each pair is an independent search writing only its own outcome slot;
/// outcomes come back in `pairs` order once every worker has finished.
pub fn enumerate_paths(
    graph: &InMemoryGraph,
    pool: &rayon::ThreadPool,
    pairs: &[(usize, usize)],
    bounds: SearchBounds,
    cancel: &CancelFlag,
) -> Result<Vec<PairOutcome>> {
    let ranks = id_ranks(graph);

    let outcomes: Vec<PairOutcome> = pool.install(|| {
        pairs
            .par_iter()
            .map(|&(entry, target)| PairOutcome {
                entry,
                target,
                paths: search_pair(graph, &ranks, entry, target, bounds, cancel),
            })
            .collect()
    });

    if cancel.is_cancelled() {
        return Err(PathfindError::Cancelled);
    }
    Ok(outcomes)
}

/// Branch-and-bound search for the K cheapest paths from `entry` to `target`.
pub fn search_pair(
    graph: &InMemoryGraph,
    ranks: &[usize],
    entry: usize,
    target: usize,
    bounds: SearchBounds,
    cancel: &CancelFlag,
) -> Vec<RawPath> {
    if entry == target || bounds.paths_per_pair == 0 {
        return Vec::new();
    }

    let mut search = PairSearch {
        graph,
        ranks,
        target,
        max_hops: bounds.max_hops,
        cancel,
        top: TopK::new(bounds.paths_per_pair),
        on_path: vec![false; graph.node_count()],
        nodes: vec![entry],
        edges: Vec::new(),
        expansions: 0,
        stopped: false,
    };
    search.on_path[entry] = true;
    search.dfs(entry, 0.0);

    let paths = search.top.into_sorted();
    tracing::debug!(
        entry = %graph.nodes[entry].id,
        target = %graph.nodes[target].id,
        found = paths.len(),
        expansions = search.expansions,
        "Pair search finished"
    );
    paths
}

/// Position of each node in id order, used for deterministic tie-breaks.
pub fn id_ranks(graph: &InMemoryGraph) -> Vec<usize> {
    let mut order: Vec<usize> = (0..graph.node_count()).collect();
    order.sort_by(|&a, &b| graph.nodes[a].id.cmp(&graph.nodes[b].id));
    let mut ranks = vec![0; order.len()];
    for (rank, node) in order.into_iter().enumerate() {
        ranks[node] = rank;
    }
    ranks
}

/// Per-pair DFS state. Owned by exactly one worker.
struct PairSearch<'a> {
    graph: &'a InMemoryGraph,
    ranks: &'a [usize],
    target: usize,
    max_hops: usize,
    cancel: &'a CancelFlag,
    top: TopK,
    on_path: Vec<bool>,
    nodes: Vec<usize>,
    edges: Vec<usize>,
    expansions: usize,
    stopped: bool,
}

impl PairSearch<'_> {
    fn dfs(&mut self, node: usize, cost: f64) {
        if self.stopped {
            return;
        }
        self.expansions += 1;
        if self.expansions % CANCEL_POLL_INTERVAL == 0 && self.cancel.is_cancelled() {
            self.stopped = true;
            return;
        }

        if node == self.target {
            let ranks = self.nodes.iter().map(|&n| self.ranks[n]).collect();
            self.top.offer(
                RawPath {
                    node_indices: self.nodes.clone(),
                    edges: self.edges.clone(),
                    total_difficulty: cost,
                },
                ranks,
            );
            return;
        }

        if self.edges.len() >= self.max_hops {
            return;
        }

        let graph = self.graph;
        for &edge_idx in &graph.adjacency[node] {
            let edge = &graph.edges[edge_idx];
            if self.on_path[edge.target] {
                continue;
            }
            let next_cost = cost + edge.traversal_difficulty;
            if next_cost > self.top.bound() {
                continue;
            }

            self.on_path[edge.target] = true;
            self.nodes.push(edge.target);
            self.edges.push(edge_idx);

            self.dfs(edge.target, next_cost);

            self.edges.pop();
            self.nodes.pop();
            self.on_path[edge.target] = false;
        }
    }
}

/// A complete path competing for a top-K slot.
#[derive(Debug)]
struct Candidate {
    ranks: Vec<usize>,
    path: RawPath,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .total_difficulty
            .total_cmp(&other.path.total_difficulty)
            .then_with(|| self.ranks.cmp(&other.ranks))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fixed-capacity max-heap: the root is the worst retained path.
#[derive(Debug)]
struct TopK {
    capacity: usize,
    heap: BinaryHeap<Candidate>,
}

impl TopK {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    /// Difficulty a partial path must not exceed to still matter.
    fn bound(&self) -> f64 {
        if self.heap.len() < self.capacity {
            f64::INFINITY
        } else {
            self.heap
                .peek()
                .map_or(f64::INFINITY, |c| c.path.total_difficulty)
        }
    }

    fn offer(&mut self, path: RawPath, ranks: Vec<usize>) {
        let candidate = Candidate { ranks, path };

        // Parallel edges can yield the same node sequence twice.
        if let Some(existing) = self.heap.iter().find(|c| c.ranks == candidate.ranks) {
            if candidate >= *existing {
                return;
            }
            let ranks = candidate.ranks.clone();
            let kept: Vec<Candidate> = self.heap.drain().filter(|c| c.ranks != ranks).collect();
            self.heap.extend(kept);
            self.heap.push(candidate);
            return;
        }

        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
        } else if self.heap.peek().is_some_and(|worst| candidate < *worst) {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    fn into_sorted(self) -> Vec<RawPath> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| c.path)
            .collect()
    }
}

/// Shortest weighted path using Dijkstra's algorithm over
/// `traversal_difficulty`. Returns `None` if `target` is unreachable.
pub fn shortest_weighted_path(
    graph: &InMemoryGraph,
    source: usize,
    target: usize,
) -> Option<RawPath> {
    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<usize>> = vec![None; n]; // edge index into node
    let mut visited = vec![false; n];

    dist[source] = 0.0;

    let mut heap = BinaryHeap::new();
    heap.push(DijkstraState {
        cost: 0.0,
        node: source,
    });

    while let Some(DijkstraState { cost, node }) = heap.pop() {
        if node == target {
            break;
        }

        if visited[node] {
            continue;
        }
        visited[node] = true;

        if cost > dist[node] {
            continue;
        }

        for edge in graph.outgoing(node) {
            let new_dist = dist[node] + edge.traversal_difficulty;

            if new_dist < dist[edge.target] {
                dist[edge.target] = new_dist;
                prev[edge.target] = Some(edge.index);
                heap.push(DijkstraState {
                    cost: new_dist,
                    node: edge.target,
                });
            }
        }
    }

    // No path found.
    if dist[target].is_infinite() {
        return None;
    }

    // Reconstruct path.
    let mut node_indices = vec![target];
    let mut edges = Vec::new();
    let mut current = target;

    while let Some(edge_idx) = prev[current] {
        edges.push(edge_idx);
        current = graph.edges[edge_idx].source;
        node_indices.push(current);
    }

    node_indices.reverse();
    edges.reverse();

    Some(RawPath {
        node_indices,
        edges,
        total_difficulty: dist[target],
    })
}

/// State for Dijkstra's priority queue (min-heap by cost).
#[derive(Debug, Clone, PartialEq)]
struct DijkstraState {
    cost: f64,
    node: usize,
}

impl Eq for DijkstraState {}

impl Ord for DijkstraState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap (BinaryHeap is a max-heap).
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for DijkstraState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
