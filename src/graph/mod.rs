//! k-nearest-neighbor similarity graph over embedding vectors.
//!
//! Vectors are L2-normalised first, so cosine distance between two rows is
//! `1 - dot(a, b)` and the edge weight `1 - distance` is just their cosine
//! similarity. Each node proposes its k most similar nodes; the directed
//! proposals are merged into an undirected edge set by union and stored as a
//! symmetric CSR matrix.

#[cfg(test)]
mod tests;

use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingMatrix;
use crate::{CommunityError, Result};

/// Undirected weighted graph without self-loops
#[derive(Debug, Clone)]
pub struct SimilarityGraph {
    adjacency: CsMat<f64>,
    n_edges: usize,
    k_neighbors: usize,
}

impl SimilarityGraph {
    /// Build a graph from an edge list.
    ///
    /// Duplicate edges in either direction collapse into one undirected edge
    /// keeping the first weight seen. Self-loops are rejected.
    #[inline]
    pub fn from_edges<I>(n_nodes: usize, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut unique: BTreeMap<(usize, usize), f64> = BTreeMap::new();

        for (source, target, weight) in edges {
            if source >= n_nodes || target >= n_nodes {
                return Err(CommunityError::Input(format!(
                    "edge ({}, {}) references a node outside a graph of {} nodes",
                    source, target, n_nodes
                )));
            }
            if source == target {
                return Err(CommunityError::Input(format!(
                    "self-loop on node {} is not allowed",
                    source
                )));
            }
            unique
                .entry((source.min(target), source.max(target)))
                .or_insert(weight);
        }

        let mut triplets = TriMat::with_capacity((n_nodes, n_nodes), unique.len() * 2);
        for (&(i, j), &weight) in &unique {
            triplets.add_triplet(i, j, weight);
            triplets.add_triplet(j, i, weight);
        }

        Ok(Self {
            adjacency: triplets.to_csr(),
            n_edges: unique.len(),
            k_neighbors: 0,
        })
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.adjacency.rows()
    }

    /// Number of undirected edges
    #[inline]
    pub fn n_edges(&self) -> usize {
        self.n_edges
    }

    /// Neighbor count used to build the graph after clamping, 0 for hand-built graphs
    #[inline]
    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    #[inline]
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (indices, weights) = self
            .adjacency
            .outer_view(node)
            .map_or((&[][..], &[][..]), |row| row.into_raw_storage());
        indices.iter().copied().zip(weights.iter().copied())
    }

    /// Each undirected edge once, as `(i, j, weight)` with `i < j`
    #[inline]
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n_nodes()).flat_map(move |i| {
            self.neighbors(i)
                .filter(move |&(j, _)| i < j)
                .map(move |(j, w)| (i, j, w))
        })
    }

    /// Sum of undirected edge weights (the `m` of the modularity formula)
    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.edges().map(|(_, _, w)| w).sum()
    }
}

/// Build the k-NN cosine similarity graph.
///
/// When fewer than `k + 1` vectors are available, `k` is reduced to `N - 1`.
#[inline]
pub fn build_knn_graph(vectors: &EmbeddingMatrix, k: usize) -> Result<SimilarityGraph> {
    if k == 0 {
        return Err(CommunityError::Configuration(
            "k_neighbors must be a positive integer, got 0".to_string(),
        ));
    }

    let n = vectors.n_items();
    let effective_k = if n < k + 1 {
        let reduced = n.saturating_sub(1);
        warn!(
            "Only {} embeddings available, reducing k_neighbors from {} to {}",
            n, k, reduced
        );
        reduced
    } else {
        k
    };

    info!("Building k-NN graph with k={}...", effective_k);

    let normalized = vectors.l2_normalized();
    let neighbor_lists: Vec<Vec<(usize, f64)>> = (0..n)
        .into_par_iter()
        .map(|i| nearest_neighbors(&normalized, i, effective_k))
        .collect();

    let edges = neighbor_lists
        .into_iter()
        .enumerate()
        .flat_map(|(i, neighbors)| {
            neighbors
                .into_iter()
                .map(move |(j, similarity)| (i, j, similarity))
        });

    let mut graph = SimilarityGraph::from_edges(n, edges)?;
    graph.k_neighbors = effective_k;

    info!(
        "Created graph with {} nodes and {} edges",
        graph.n_nodes(),
        graph.n_edges()
    );
    debug!("Total edge weight {:.4}", graph.total_weight());
    Ok(graph)
}

/// The `k` rows most similar to `query`, excluding itself.
///
/// Ties are broken by lower index so neighbor lists are deterministic.
fn nearest_neighbors(normalized: &EmbeddingMatrix, query: usize, k: usize) -> Vec<(usize, f64)> {
    if k == 0 {
        return Vec::new();
    }

    let query_row = normalized.row(query);
    let mut candidates: Vec<(usize, f64)> = normalized
        .rows()
        .enumerate()
        .filter(|&(j, _)| j != query)
        .map(|(j, row)| (j, dot(query_row, row)))
        .collect();

    let by_similarity =
        |a: &(usize, f64), b: &(usize, f64)| -> Ordering { b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)) };

    if candidates.len() > k {
        candidates.select_nth_unstable_by(k - 1, by_similarity);
        candidates.truncate(k);
    }
    candidates.sort_by(by_similarity);
    candidates
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
