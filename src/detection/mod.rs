//! Community detection over embeddings.
//!
//! Leiden on the k-NN similarity graph is the primary algorithm. A Leiden
//! attempt that cannot partition the graph reports a typed [`LeidenFailure`];
//! the detector then reruns the request with K-means on the raw vectors and
//! marks the result as [`AlgorithmUsed::KMeansFallback`].

pub mod kmeans;
pub mod leiden;


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::embedding::{ChunkMetadata, EmbeddingMatrix};
use crate::graph::{SimilarityGraph, build_knn_graph};
use crate::{CommunityError, Result};

pub use kmeans::{KMeansClustering, KMeansConfig, KMeansFailure, KMeansPartition};
pub use leiden::{Leiden, LeidenConfig, LeidenFailure, LeidenPartition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Leiden,
    KMeans,
}

impl fmt::Display for Algorithm {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Algorithm::Leiden => write!(f, "leiden"),
            Algorithm::KMeans => write!(f, "kmeans"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = CommunityError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leiden" => Ok(Algorithm::Leiden),
            "kmeans" | "k-means" => Ok(Algorithm::KMeans),
            _ => Err(CommunityError::Configuration(format!(
                "Unknown algorithm: {} (expected 'leiden' or 'kmeans')",
                s
            ))),
        }
    }
}

/// Algorithm that actually produced a [`DetectionResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmUsed {
    #[serde(rename = "leiden")]
    Leiden,
    #[serde(rename = "kmeans")]
    KMeans,
    #[serde(rename = "kmeans_fallback")]
    KMeansFallback,
}

impl fmt::Display for AlgorithmUsed {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AlgorithmUsed::Leiden => write!(f, "leiden"),
            AlgorithmUsed::KMeans => write!(f, "kmeans"),
            AlgorithmUsed::KMeansFallback => write!(f, "kmeans_fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionParams {
    pub algorithm: Algorithm,
    /// Neighbors per node in the similarity graph (Leiden only)
    pub k_neighbors: usize,
    /// Explicit K-means cluster count, `None` for the size-based default
    pub n_clusters: Option<usize>,
    /// Seed for every randomized step
    pub seed: u64,
    pub n_iterations: usize,
    pub resolution: f64,
    pub n_init: usize,
    pub max_iter: usize,
}

impl Default for DetectionParams {
    #[inline]
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Leiden,
            k_neighbors: 20,
            n_clusters: None,
            seed: 42,
            n_iterations: 10,
            resolution: 1.0,
            n_init: 10,
            max_iter: 300,
        }
    }
}

impl DetectionParams {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("k_neighbors", self.k_neighbors),
            ("n_iterations", self.n_iterations),
            ("n_init", self.n_init),
            ("max_iter", self.max_iter),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(CommunityError::Configuration(format!(
                    "{} must be a positive integer, got 0",
                    name
                )));
            }
        }

        if self.n_clusters == Some(0) {
            return Err(CommunityError::Configuration(
                "n_clusters must be a positive integer or auto, got 0".to_string(),
            ));
        }

        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(CommunityError::Configuration(format!(
                "resolution must be a positive number, got {}",
                self.resolution
            )));
        }

        Ok(())
    }

    fn leiden_config(&self) -> LeidenConfig {
        LeidenConfig {
            resolution: self.resolution,
            n_iterations: self.n_iterations,
            seed: self.seed,
            ..Default::default()
        }
    }

    fn kmeans_config(&self) -> KMeansConfig {
        KMeansConfig {
            n_clusters: self.n_clusters,
            n_init: self.n_init,
            max_iter: self.max_iter,
            seed: self.seed,
        }
    }
}

/// Community labeling of every item plus summary statistics
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub labels: Vec<usize>,
    /// Graph modularity for Leiden. For K-means this is the pseudo-modularity
    /// `1 - inertia / (N * D)`, a heuristic that is not comparable with real
    /// modularity; see [`DetectionResult::is_pseudo_modularity`].
    pub modularity: f64,
    pub n_communities: usize,
    pub community_sizes: BTreeMap<usize, usize>,
    pub algorithm: AlgorithmUsed,
    /// Neighbor count of the similarity graph, only set when Leiden produced the result
    pub k_neighbors: Option<usize>,
}

impl DetectionResult {
    #[inline]
    pub fn from_labels(
        labels: Vec<usize>,
        modularity: f64,
        algorithm: AlgorithmUsed,
        k_neighbors: Option<usize>,
    ) -> Self {
        let community_sizes = community_sizes(&labels);
        Self {
            n_communities: community_sizes.len(),
            labels,
            modularity,
            community_sizes,
            algorithm,
            k_neighbors,
        }
    }

    #[inline]
    pub fn is_pseudo_modularity(&self) -> bool {
        self.algorithm != AlgorithmUsed::Leiden
    }
}

/// Outcome of the Leiden attempt, before any fallback decision
#[derive(Debug, Clone, PartialEq)]
enum PrimaryAttempt {
    Partitioned(LeidenPartition),
    Failed(LeidenFailure),
}

#[derive(Debug, Clone)]
pub struct CommunityDetector {
    params: DetectionParams,
}

impl CommunityDetector {
    #[inline]
    pub fn new(params: DetectionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    #[inline]
    pub fn detect(&self, vectors: &EmbeddingMatrix) -> Result<DetectionResult> {
        match self.params.algorithm {
            Algorithm::Leiden => {
                let graph = build_knn_graph(vectors, self.params.k_neighbors)?;
                self.detect_with_graph(vectors, &graph)
            }
            Algorithm::KMeans => self
                .run_kmeans(vectors, AlgorithmUsed::KMeans)
                .map_err(|e| CommunityError::DetectionFailure {
                    primary: e.to_string(),
                    fallback: "no fallback for K-means".to_string(),
                }),
        }
    }

    /// Run Leiden on a prebuilt graph, falling back to K-means if it cannot partition it
    #[inline]
    pub fn detect_with_graph(
        &self,
        vectors: &EmbeddingMatrix,
        graph: &SimilarityGraph,
    ) -> Result<DetectionResult> {
        match self.attempt_primary(vectors, graph) {
            PrimaryAttempt::Partitioned(partition) => {
                let k_neighbors = if graph.k_neighbors() > 0 {
                    graph.k_neighbors()
                } else {
                    self.params.k_neighbors
                };
                Ok(DetectionResult::from_labels(
                    partition.membership,
                    partition.modularity,
                    AlgorithmUsed::Leiden,
                    Some(k_neighbors),
                ))
            }
            PrimaryAttempt::Failed(reason) => {
                warn!("Error in community detection: {}", reason);
                warn!("Falling back to K-means...");
                self.run_kmeans(vectors, AlgorithmUsed::KMeansFallback)
                    .map_err(|fallback| {
                        error!("K-means fallback failed: {}", fallback);
                        CommunityError::DetectionFailure {
                            primary: reason.to_string(),
                            fallback: fallback.to_string(),
                        }
                    })
            }
        }
    }

    fn attempt_primary(&self, vectors: &EmbeddingMatrix, graph: &SimilarityGraph) -> PrimaryAttempt {
        if graph.n_nodes() != vectors.n_items() {
            return PrimaryAttempt::Failed(LeidenFailure::SizeMismatch {
                graph_nodes: graph.n_nodes(),
                items: vectors.n_items(),
            });
        }

        match Leiden::new(self.params.leiden_config()).partition(graph) {
            Ok(partition) => PrimaryAttempt::Partitioned(partition),
            Err(reason) => PrimaryAttempt::Failed(reason),
        }
    }

    fn run_kmeans(
        &self,
        vectors: &EmbeddingMatrix,
        algorithm: AlgorithmUsed,
    ) -> std::result::Result<DetectionResult, KMeansFailure> {
        let partition = KMeansClustering::new(self.params.kmeans_config()).cluster(vectors)?;
        Ok(DetectionResult::from_labels(
            partition.labels,
            partition.pseudo_modularity,
            algorithm,
            None,
        ))
    }
}

/// Detect communities for embeddings and their parallel metadata records
#[inline]
pub fn detect(
    vectors: &EmbeddingMatrix,
    metadata: &[ChunkMetadata],
    params: &DetectionParams,
) -> Result<DetectionResult> {
    if metadata.len() != vectors.n_items() {
        return Err(CommunityError::Input(format!(
            "{} metadata records for {} embeddings",
            metadata.len(),
            vectors.n_items()
        )));
    }

    let detector = CommunityDetector::new(params.clone())?;
    let result = detector.detect(vectors)?;

    info!(
        "Detected {} communities using {} (score {:.4})",
        result.n_communities, result.algorithm, result.modularity
    );
    Ok(result)
}

/// Member count per label
#[inline]
pub fn community_sizes(labels: &[usize]) -> BTreeMap<usize, usize> {
    let mut sizes = BTreeMap::new();
    for &label in labels {
        *sizes.entry(label).or_insert(0) += 1;
    }
    sizes
}
