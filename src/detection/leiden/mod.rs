//! Leiden community detection
//!
//! Modularity maximisation following Traag, Waltman & van Eck, "From Louvain
//! to Leiden: guaranteeing well-connected communities" (2019). Each level
//! runs three phases:
//!
//! 1. **Fast local moving**: nodes are visited from a queue and moved to the
//!    neighboring community with the largest modularity gain; neighbors of a
//!    moved node are re-queued.
//! 2. **Refinement**: every community is split into well-connected
//!    sub-communities by merging singletons, picking among non-negative gains
//!    at random with probability `exp(gain / randomness)`.
//! 3. **Aggregation**: the refined sub-communities become the nodes of the
//!    next level, starting from the unrefined partition.
//!
//! Levels repeat until local moving leaves every node of the aggregate graph
//! in its own community. A full pass over the levels is one iteration.
//!
//! Modularity: `Q = Σ_c [ in_c / m - γ (Σ_c / 2m)^2 ]` where `in_c` is the edge
//! weight inside community `c`, `Σ_c` its total degree and `m` the total edge
//! weight.


use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;
use tracing::{debug, info};

use crate::graph::SimilarityGraph;

/// Gains below this are treated as no improvement
const GAIN_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct LeidenConfig {
    /// Resolution parameter (higher = more communities)
    pub resolution: f64,
    /// Number of full Leiden iterations; stops early once an iteration changes nothing
    pub n_iterations: usize,
    /// Temperature of the randomized merge choice during refinement
    pub randomness: f64,
    pub seed: u64,
}

impl Default for LeidenConfig {
    #[inline]
    fn default() -> Self {
        Self {
            resolution: 1.0,
            n_iterations: 10,
            randomness: 0.01,
            seed: 42,
        }
    }
}

/// Why a graph cannot be partitioned
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LeidenFailure {
    #[error("graph has {0} nodes, at least 2 are required")]
    TooFewNodes(usize),
    #[error("graph has no edges")]
    NoEdges,
    #[error("edge ({node_a}, {node_b}) has a non-finite weight")]
    NonFiniteWeight { node_a: usize, node_b: usize },
    #[error("edge ({node_a}, {node_b}) has negative weight {weight}")]
    NegativeWeight {
        node_a: usize,
        node_b: usize,
        weight: f64,
    },
    #[error("graph has zero total edge weight")]
    ZeroTotalWeight,
    #[error("graph has {graph_nodes} nodes but {items} embeddings were supplied")]
    SizeMismatch { graph_nodes: usize, items: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeidenPartition {
    /// Community per node, numbered from 0 by decreasing community size
    pub membership: Vec<usize>,
    pub modularity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Leiden {
    config: LeidenConfig,
}

impl Leiden {
    #[inline]
    pub fn new(config: LeidenConfig) -> Self {
        Self { config }
    }

    /// Partition the graph, maximising modularity
    #[inline]
    pub fn partition(&self, graph: &SimilarityGraph) -> Result<LeidenPartition, LeidenFailure> {
        validate_graph(graph)?;

        info!("Running Leiden algorithm...");

        let base = WorkGraph::from_similarity(graph);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut membership: Vec<usize> = (0..base.len()).collect();

        for iteration in 0..self.config.n_iterations.max(1) {
            let next = self.run_iteration(&base, &membership, &mut rng);
            let changed = next != membership;
            membership = next;

            debug!(
                "Leiden iteration {}: {} communities, modularity {:.4}",
                iteration + 1,
                count_labels(&membership),
                modularity(graph, &membership, self.config.resolution)
            );

            if !changed {
                break;
            }
        }

        let membership = renumber_by_size(&membership);
        let modularity = modularity(graph, &membership, self.config.resolution);

        info!(
            "Found {} communities with modularity {:.4}",
            count_labels(&membership),
            modularity
        );

        Ok(LeidenPartition {
            membership,
            modularity,
        })
    }

    /// One Leiden iteration over all aggregation levels, starting from `initial`
    fn run_iteration(&self, base: &WorkGraph, initial: &[usize], rng: &mut StdRng) -> Vec<usize> {
        let mut level_graph = base.clone();
        let mut partition = renumber(initial);
        // base node -> node of the current aggregate graph
        let mut node_map: Vec<usize> = (0..base.len()).collect();

        loop {
            self.move_nodes(&level_graph, &mut partition, rng);

            let n_communities = count_labels(&partition);
            if n_communities == level_graph.len() {
                break;
            }

            let mut refined = renumber(&self.refine(&level_graph, &partition, rng));
            if count_labels(&refined) == level_graph.len() {
                // refinement merged nothing, aggregate on the unrefined partition
                refined = partition.clone();
            }

            let n_aggregate = count_labels(&refined);
            let mut next_partition = vec![0; n_aggregate];
            for (node, &aggregate) in refined.iter().enumerate() {
                next_partition[aggregate] = partition[node];
            }

            level_graph = level_graph.aggregate(&refined, n_aggregate);
            for mapped in &mut node_map {
                *mapped = refined[*mapped];
            }
            partition = renumber(&next_partition);
        }

        node_map.iter().map(|&node| partition[node]).collect()
    }

    /// Queue-based local moving. Returns whether any node changed community.
    fn move_nodes(&self, graph: &WorkGraph, membership: &mut [usize], rng: &mut StdRng) -> bool {
        let n = graph.len();
        let scale = self.config.resolution / graph.total_degree;

        let mut community_degree = vec![0.0; n];
        let mut community_size = vec![0usize; n];
        for (node, &community) in membership.iter().enumerate() {
            community_degree[community] += graph.degrees[node];
            community_size[community] += 1;
        }
        let mut empty: Vec<usize> = (0..n).filter(|&c| community_size[c] == 0).collect();

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);
        let mut queue: VecDeque<usize> = order.into();
        let mut queued = vec![true; n];

        let mut neighbor_weight = vec![0.0; n];
        let mut seen = vec![false; n];
        let mut touched: Vec<usize> = Vec::new();
        let mut moved = false;

        while let Some(node) = queue.pop_front() {
            queued[node] = false;
            let current = membership[node];
            let degree = graph.degrees[node];

            community_degree[current] -= degree;
            community_size[current] -= 1;

            touched.push(current);
            seen[current] = true;
            for &(neighbor, weight) in &graph.adjacency[node] {
                let community = membership[neighbor];
                if !seen[community] {
                    seen[community] = true;
                    touched.push(community);
                }
                neighbor_weight[community] += weight;
            }

            let mut best = current;
            let mut best_gain =
                neighbor_weight[current] - degree * community_degree[current] * scale;
            for &community in &touched {
                let gain = neighbor_weight[community] - degree * community_degree[community] * scale;
                if gain > best_gain + GAIN_TOLERANCE {
                    best = community;
                    best_gain = gain;
                }
            }

            // an empty community has gain 0
            if best_gain < -GAIN_TOLERANCE && community_size[current] > 0 {
                if let Some(&free) = empty.last() {
                    best = free;
                }
            }

            for &community in &touched {
                neighbor_weight[community] = 0.0;
                seen[community] = false;
            }
            touched.clear();

            if best != current && empty.last() == Some(&best) {
                empty.pop();
            }
            community_degree[best] += degree;
            community_size[best] += 1;
            if community_size[current] == 0 && best != current {
                empty.push(current);
            }

            if best != current {
                membership[node] = best;
                moved = true;
                for &(neighbor, _) in &graph.adjacency[node] {
                    if !queued[neighbor] && membership[neighbor] != best {
                        queued[neighbor] = true;
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        moved
    }

    /// Split each community into well-connected sub-communities
    fn refine(&self, graph: &WorkGraph, membership: &[usize], rng: &mut StdRng) -> Vec<usize> {
        let n = graph.len();
        let scale = self.config.resolution / graph.total_degree;

        let mut community_degree = vec![0.0; n];
        for (node, &community) in membership.iter().enumerate() {
            community_degree[community] += graph.degrees[node];
        }

        let mut refined: Vec<usize> = (0..n).collect();
        let mut refined_degree = graph.degrees.clone();
        let mut singleton = vec![true; n];
        // weight from each refined community to the rest of its enclosing community
        let mut external: Vec<f64> = (0..n)
            .map(|node| {
                graph.adjacency[node]
                    .iter()
                    .filter(|&&(neighbor, _)| membership[neighbor] == membership[node])
                    .map(|&(_, weight)| weight)
                    .sum()
            })
            .collect();

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);

        let mut neighbor_weight = vec![0.0; n];
        let mut seen = vec![false; n];
        let mut touched: Vec<usize> = Vec::new();

        for node in order {
            if !singleton[node] {
                continue;
            }

            let community = membership[node];
            let degree = graph.degrees[node];
            if external[node] < degree * (community_degree[community] - degree) * scale {
                continue;
            }

            for &(neighbor, weight) in &graph.adjacency[node] {
                if membership[neighbor] != community {
                    continue;
                }
                let target = refined[neighbor];
                if target == refined[node] {
                    continue;
                }
                if !seen[target] {
                    seen[target] = true;
                    touched.push(target);
                }
                neighbor_weight[target] += weight;
            }

            // staying alone has gain 0
            let mut candidates: Vec<(usize, f64)> = vec![(refined[node], 0.0)];
            for &target in &touched {
                let target_degree = refined_degree[target];
                let well_connected = external[target]
                    >= target_degree * (community_degree[community] - target_degree) * scale;
                let gain = neighbor_weight[target] - degree * target_degree * scale;
                if well_connected && gain >= 0.0 {
                    candidates.push((target, gain));
                }
            }

            let chosen = self.choose_merge(&candidates, graph.total_degree, rng);
            if chosen != refined[node] {
                let weight_to_target = neighbor_weight[chosen];
                external[chosen] = external[chosen] + external[node] - 2.0 * weight_to_target;
                refined_degree[chosen] += degree;
                refined_degree[refined[node]] -= degree;
                refined[node] = chosen;
                singleton[node] = false;
                singleton[chosen] = false;
            }

            for &target in &touched {
                neighbor_weight[target] = 0.0;
                seen[target] = false;
            }
            touched.clear();
        }

        refined
    }

    fn choose_merge(&self, candidates: &[(usize, f64)], total_degree: f64, rng: &mut StdRng) -> usize {
        let stay = candidates[0].0;
        if candidates.len() == 1 {
            return stay;
        }

        // gains in modularity units
        let gains: Vec<f64> = candidates.iter().map(|&(_, gain)| 2.0 * gain / total_degree).collect();
        let max_gain = gains.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = gains
            .iter()
            .map(|gain| ((gain - max_gain) / self.config.randomness).exp())
            .collect();

        match WeightedIndex::new(&weights) {
            Ok(distribution) => candidates[distribution.sample(rng)].0,
            Err(_) => stay,
        }
    }
}

/// Modularity of a labeling of `graph`
#[inline]
pub fn modularity(graph: &SimilarityGraph, membership: &[usize], resolution: f64) -> f64 {
    let n_labels = membership.iter().max().map_or(0, |&max| max + 1);
    let mut internal = vec![0.0; n_labels];
    let mut degree = vec![0.0; n_labels];
    let mut total = 0.0;

    for (i, j, weight) in graph.edges() {
        total += weight;
        degree[membership[i]] += weight;
        degree[membership[j]] += weight;
        if membership[i] == membership[j] {
            internal[membership[i]] += weight;
        }
    }

    if total <= 0.0 {
        return 0.0;
    }

    internal
        .iter()
        .zip(&degree)
        .map(|(&inside, &sum)| inside / total - resolution * (sum / (2.0 * total)).powi(2))
        .sum()
}

fn validate_graph(graph: &SimilarityGraph) -> Result<(), LeidenFailure> {
    if graph.n_nodes() < 2 {
        return Err(LeidenFailure::TooFewNodes(graph.n_nodes()));
    }
    if graph.n_edges() == 0 {
        return Err(LeidenFailure::NoEdges);
    }

    let mut total = 0.0;
    for (node_a, node_b, weight) in graph.edges() {
        if !weight.is_finite() {
            return Err(LeidenFailure::NonFiniteWeight { node_a, node_b });
        }
        if weight < 0.0 {
            return Err(LeidenFailure::NegativeWeight {
                node_a,
                node_b,
                weight,
            });
        }
        total += weight;
    }

    if total <= 0.0 {
        return Err(LeidenFailure::ZeroTotalWeight);
    }
    Ok(())
}

/// Adjacency-list graph used across aggregation levels
#[derive(Debug, Clone)]
struct WorkGraph {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    degrees: Vec<f64>,
    /// Sum of all degrees, i.e. twice the total edge weight
    total_degree: f64,
}

impl WorkGraph {
    fn from_similarity(graph: &SimilarityGraph) -> Self {
        let adjacency: Vec<Vec<(usize, f64)>> = (0..graph.n_nodes())
            .map(|node| graph.neighbors(node).collect())
            .collect();
        Self::with_self_loops(adjacency, vec![0.0; graph.n_nodes()])
    }

    fn with_self_loops(adjacency: Vec<Vec<(usize, f64)>>, self_loops: Vec<f64>) -> Self {
        let degrees: Vec<f64> = adjacency
            .iter()
            .zip(&self_loops)
            .map(|(neighbors, &self_loop)| {
                neighbors.iter().map(|&(_, weight)| weight).sum::<f64>() + 2.0 * self_loop
            })
            .collect();
        let total_degree = degrees.iter().sum();

        Self {
            adjacency,
            self_loops,
            degrees,
            total_degree,
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Collapse each community of `partition` into a single node
    fn aggregate(&self, partition: &[usize], n_communities: usize) -> Self {
        let mut merged: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n_communities];
        let mut self_loops = vec![0.0; n_communities];

        for (node, neighbors) in self.adjacency.iter().enumerate() {
            let from = partition[node];
            self_loops[from] += self.self_loops[node];
            for &(neighbor, weight) in neighbors {
                let to = partition[neighbor];
                if from == to {
                    // every internal edge is seen from both endpoints
                    self_loops[from] += weight / 2.0;
                } else {
                    *merged[from].entry(to).or_default() += weight;
                }
            }
        }

        let adjacency = merged
            .into_iter()
            .map(|neighbors| neighbors.into_iter().collect())
            .collect();
        Self::with_self_loops(adjacency, self_loops)
    }
}

fn count_labels(labels: &[usize]) -> usize {
    let mut seen = vec![false; labels.len()];
    let mut count = 0;
    for &label in labels {
        if label >= seen.len() {
            seen.resize(label + 1, false);
        }
        if !seen[label] {
            seen[label] = true;
            count += 1;
        }
    }
    count
}

/// Relabel to `0..k` in order of first appearance
fn renumber(labels: &[usize]) -> Vec<usize> {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    labels
        .iter()
        .map(|&label| {
            let next = mapping.len();
            *mapping.entry(label).or_insert(next)
        })
        .collect()
}

/// Relabel to `0..k` by decreasing community size, ties by first appearance
fn renumber_by_size(labels: &[usize]) -> Vec<usize> {
    let first_seen = renumber(labels);
    let n_labels = count_labels(&first_seen);

    let mut sizes = vec![0usize; n_labels];
    for &label in &first_seen {
        sizes[label] += 1;
    }

    let mut ranked: Vec<usize> = (0..n_labels).collect();
    ranked.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]).then(a.cmp(&b)));

    let mut rank_of = vec![0; n_labels];
    for (rank, &label) in ranked.iter().enumerate() {
        rank_of[label] = rank;
    }

    first_seen.iter().map(|&label| rank_of[label]).collect()
}
