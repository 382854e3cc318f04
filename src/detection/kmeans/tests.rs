use std::collections::HashSet;

use super::*;

fn separated_groups() -> EmbeddingMatrix {
    let mut rows = Vec::new();
    for axis in 0..3 {
        for offset in 0..5 {
            let mut row = vec![0.05 * offset as f64; 3];
            row[axis] = 1.0;
            rows.push(row);
        }
    }
    EmbeddingMatrix::from_rows(rows).expect("test rows should form a matrix")
}

#[test]
fn default_cluster_count_follows_rule_of_thumb() {
    assert_eq!(default_cluster_count(1), 2);
    assert_eq!(default_cluster_count(8), 2);
    assert_eq!(default_cluster_count(100), 7);
    assert_eq!(default_cluster_count(450), 15);
    assert_eq!(default_cluster_count(100_000), 20);
}

#[test]
fn kmeans_recovers_separated_groups() {
    let clustering = KMeansClustering::new(KMeansConfig {
        n_clusters: Some(3),
        ..Default::default()
    });

    let partition = clustering
        .cluster(&separated_groups())
        .expect("clustering should succeed");

    assert_eq!(partition.n_clusters, 3);
    let mut group_labels = HashSet::new();
    for group in partition.labels.chunks(5) {
        let labels: HashSet<usize> = group.iter().copied().collect();
        assert_eq!(labels.len(), 1, "group split across clusters: {:?}", group);
        group_labels.extend(labels);
    }
    assert_eq!(group_labels.len(), 3);
}

#[test]
fn pseudo_modularity_uses_inertia_over_items_times_dimension() {
    let vectors = separated_groups();
    let partition = KMeansClustering::new(KMeansConfig {
        n_clusters: Some(3),
        ..Default::default()
    })
    .cluster(&vectors)
    .expect("clustering should succeed");

    let expected = 1.0 - partition.inertia / (15.0 * 3.0);
    assert!((partition.pseudo_modularity - expected).abs() < 1e-12);
    assert!(partition.pseudo_modularity > 0.9);
}

#[test]
fn cluster_count_is_capped_at_item_count() {
    let vectors = EmbeddingMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]])
        .expect("test rows should form a matrix");

    let partition = KMeansClustering::new(KMeansConfig {
        n_clusters: Some(10),
        ..Default::default()
    })
    .cluster(&vectors)
    .expect("clustering should succeed");

    assert_eq!(partition.n_clusters, 2);
    assert_eq!(partition.labels.len(), 2);
}

#[test]
fn single_item_forms_one_cluster() {
    let vectors =
        EmbeddingMatrix::from_rows(vec![vec![0.3, 0.4]]).expect("test rows should form a matrix");

    let partition = KMeansClustering::default()
        .cluster(&vectors)
        .expect("clustering should succeed");

    assert_eq!(partition.labels, vec![0]);
    assert!(partition.inertia.abs() < 1e-12);
    assert!((partition.pseudo_modularity - 1.0).abs() < 1e-12);
}

#[test]
fn zero_clusters_is_rejected() {
    let failure = KMeansClustering::new(KMeansConfig {
        n_clusters: Some(0),
        ..Default::default()
    })
    .cluster(&separated_groups())
    .expect_err("zero clusters should fail");

    assert_eq!(failure, KMeansFailure::ZeroClusters);
}

#[test]
fn restarts_are_deterministic_for_a_seed() {
    let config = KMeansConfig {
        n_clusters: Some(3),
        seed: 11,
        ..Default::default()
    };
    let vectors = separated_groups();

    let first = KMeansClustering::new(config.clone())
        .cluster(&vectors)
        .expect("clustering should succeed");
    let second = KMeansClustering::new(config)
        .cluster(&vectors)
        .expect("clustering should succeed");

    assert_eq!(first, second);
}

#[test]
fn inertia_of_exact_centroids_is_zero() {
    let vectors = EmbeddingMatrix::from_rows(vec![
        vec![1.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
    ])
    .expect("test rows should form a matrix");

    assert!(inertia(&vectors, &[0, 0, 1], 2).abs() < 1e-12);
    // one cluster: centroid (2/3, 1/3)
    let expected = 2.0 * ((1.0_f64 / 3.0).powi(2) * 2.0) + (2.0_f64 / 3.0).powi(2) * 2.0;
    assert!((inertia(&vectors, &[0, 0, 0], 1) - expected).abs() < 1e-12);
}
