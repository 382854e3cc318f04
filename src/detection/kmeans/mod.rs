//! Centroid clustering on L2-normalised embeddings.
//!
//! Each restart fits smartcore's K-means with its own seed derived from the
//! configured one; the restart with the lowest inertia wins.

#[cfg(test)]
mod tests;

use rayon::prelude::*;
use smartcore::cluster::kmeans::{KMeans, KMeansParameters};
use smartcore::linalg::basic::arrays::Array2;
use smartcore::linalg::basic::matrix::DenseMatrix;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingMatrix;

pub const MIN_AUTO_CLUSTERS: usize = 2;
pub const MAX_AUTO_CLUSTERS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    /// Explicit cluster count, or `None` for [`default_cluster_count`]
    pub n_clusters: Option<usize>,
    /// Number of restarts with different initial centroids
    pub n_init: usize,
    pub max_iter: usize,
    pub seed: u64,
}

impl Default for KMeansConfig {
    #[inline]
    fn default() -> Self {
        Self {
            n_clusters: None,
            n_init: 10,
            max_iter: 300,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KMeansFailure {
    #[error("no embeddings to cluster")]
    NoItems,
    #[error("cluster count must be positive")]
    ZeroClusters,
    #[error("K-means fit failed: {0}")]
    Fit(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansPartition {
    pub labels: Vec<usize>,
    pub n_clusters: usize,
    /// Sum of squared distances from each normalised vector to its centroid
    pub inertia: f64,
    /// `1 - inertia / (N * D)`.
    ///
    /// A heuristic quality signal, not graph modularity: it is not comparable
    /// with Leiden modularity or across embeddings of different dimension.
    pub pseudo_modularity: f64,
}

/// Rule-of-thumb cluster count: `floor(sqrt(N / 2))` clamped to `[2, 20]`
#[inline]
pub fn default_cluster_count(n_items: usize) -> usize {
    ((n_items as f64 / 2.0).sqrt() as usize).clamp(MIN_AUTO_CLUSTERS, MAX_AUTO_CLUSTERS)
}

#[derive(Debug, Clone, Default)]
pub struct KMeansClustering {
    config: KMeansConfig,
}

impl KMeansClustering {
    #[inline]
    pub fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn cluster(&self, vectors: &EmbeddingMatrix) -> Result<KMeansPartition, KMeansFailure> {
        info!("Running K-means clustering...");

        let n = vectors.n_items();
        if n == 0 {
            return Err(KMeansFailure::NoItems);
        }

        let requested = self
            .config
            .n_clusters
            .unwrap_or_else(|| default_cluster_count(n));
        if requested == 0 {
            return Err(KMeansFailure::ZeroClusters);
        }
        let k = if requested > n {
            warn!(
                "Requested {} clusters for {} embeddings, using {}",
                requested, n, n
            );
            n
        } else {
            requested
        };

        let normalized = vectors.l2_normalized();

        let (labels, inertia) = if k == 1 {
            let labels = vec![0; n];
            let inertia = inertia(&normalized, &labels, 1);
            (labels, inertia)
        } else {
            self.best_of_restarts(&normalized, k)?
        };

        let pseudo_modularity = 1.0 - inertia / (n * vectors.dimension()) as f64;

        info!(
            "K-means found {} clusters with pseudo-modularity {:.4}",
            k, pseudo_modularity
        );

        Ok(KMeansPartition {
            labels,
            n_clusters: k,
            inertia,
            pseudo_modularity,
        })
    }

    fn best_of_restarts(
        &self,
        normalized: &EmbeddingMatrix,
        k: usize,
    ) -> Result<(Vec<usize>, f64), KMeansFailure> {
        let x = DenseMatrix::from_iterator(
            normalized.as_slice().iter().copied(),
            normalized.n_items(),
            normalized.dimension(),
            0,
        );

        let restarts: Vec<Result<(Vec<usize>, f64), KMeansFailure>> = (0..self.config.n_init.max(1))
            .into_par_iter()
            .map(|restart| {
                let seed = self.config.seed.wrapping_add(restart as u64);
                let labels = fit_predict(&x, k, self.config.max_iter, seed)?;
                let inertia = inertia(normalized, &labels, k);
                debug!("K-means restart {} (seed {}): inertia {:.6}", restart, seed, inertia);
                Ok((labels, inertia))
            })
            .collect();

        let mut best: Option<(Vec<usize>, f64)> = None;
        for restart in restarts {
            let (labels, inertia) = restart?;
            if best.as_ref().is_none_or(|(_, current)| inertia < *current) {
                best = Some((labels, inertia));
            }
        }

        best.ok_or(KMeansFailure::NoItems)
    }
}

fn fit_predict(
    x: &DenseMatrix<f64>,
    k: usize,
    max_iter: usize,
    seed: u64,
) -> Result<Vec<usize>, KMeansFailure> {
    let params = KMeansParameters {
        k,
        max_iter,
        seed: Some(seed),
    };

    let model: KMeans<f64, usize, DenseMatrix<f64>, Vec<usize>> =
        KMeans::fit(x, params).map_err(|e| KMeansFailure::Fit(e.to_string()))?;
    model
        .predict(x)
        .map_err(|e| KMeansFailure::Fit(e.to_string()))
}

/// Sum of squared distances from each row to the mean of its cluster
#[inline]
pub fn inertia(vectors: &EmbeddingMatrix, labels: &[usize], k: usize) -> f64 {
    let dimension = vectors.dimension();
    let n_labels = labels.iter().max().map_or(k, |&max| k.max(max + 1));

    let mut centroids = vec![0.0; n_labels * dimension];
    let mut counts = vec![0usize; n_labels];
    for (row, &label) in vectors.rows().zip(labels) {
        counts[label] += 1;
        for (sum, value) in centroids[label * dimension..(label + 1) * dimension]
            .iter_mut()
            .zip(row)
        {
            *sum += value;
        }
    }
    for (label, &count) in counts.iter().enumerate() {
        if count > 0 {
            centroids[label * dimension..(label + 1) * dimension]
                .iter_mut()
                .for_each(|v| *v /= count as f64);
        }
    }

    vectors
        .rows()
        .zip(labels)
        .map(|(row, &label)| {
            let centroid = &centroids[label * dimension..(label + 1) * dimension];
            row.iter()
                .zip(centroid)
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
        })
        .sum()
}
