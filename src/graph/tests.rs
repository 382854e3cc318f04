use super::*;

fn matrix(rows: Vec<Vec<f64>>) -> EmbeddingMatrix {
    EmbeddingMatrix::from_rows(rows).expect("test rows should form a matrix")
}

#[test]
fn knn_graph_has_no_self_loops() {
    let vectors = matrix(vec![
        vec![1.0, 0.0],
        vec![0.9, 0.1],
        vec![0.0, 1.0],
        vec![0.1, 0.9],
    ]);

    let graph = build_knn_graph(&vectors, 1).expect("graph should build");

    for (i, j, _) in graph.edges() {
        assert_ne!(i, j);
    }
    assert_eq!(graph.n_nodes(), 4);
    assert_eq!(graph.k_neighbors(), 1);
}

#[test]
fn knn_graph_links_nearest_pairs() {
    let vectors = matrix(vec![
        vec![1.0, 0.0],
        vec![0.9, 0.1],
        vec![0.0, 1.0],
        vec![0.1, 0.9],
    ]);

    let graph = build_knn_graph(&vectors, 1).expect("graph should build");
    let edges: Vec<(usize, usize)> = graph.edges().map(|(i, j, _)| (i, j)).collect();

    assert_eq!(edges, vec![(0, 1), (2, 3)]);
}

#[test]
fn asymmetric_neighbors_are_merged_by_union() {
    // 2 is closest to 1, but 1 is closest to 0: the union keeps both edges
    let vectors = matrix(vec![vec![1.0, 0.0], vec![0.95, 0.3], vec![0.6, 0.8]]);

    let graph = build_knn_graph(&vectors, 1).expect("graph should build");
    let edges: Vec<(usize, usize)> = graph.edges().map(|(i, j, _)| (i, j)).collect();

    assert_eq!(edges, vec![(0, 1), (1, 2)]);
    assert_eq!(graph.n_edges(), 2);
}

#[test]
fn edge_weight_is_cosine_similarity() {
    let a = vec![1.0, 2.0, 3.0];
    let b = vec![2.0, 1.0, 0.5];
    let vectors = matrix(vec![a.clone(), b.clone()]);

    let graph = build_knn_graph(&vectors, 1).expect("graph should build");
    let edges: Vec<(usize, usize, f64)> = graph.edges().collect();

    assert_eq!(edges.len(), 1);
    let expected = dot(&a, &b) / (dot(&a, &a).sqrt() * dot(&b, &b).sqrt());
    assert!((edges[0].2 - expected).abs() < 1e-12);
}

#[test]
fn k_larger_than_population_is_clamped() {
    let vectors = matrix(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]);

    let graph = build_knn_graph(&vectors, 10).expect("graph should build with clamped k");

    assert_eq!(graph.k_neighbors(), 2);
    // complete graph on three nodes
    assert_eq!(graph.n_edges(), 3);
}

#[test]
fn two_items_with_large_k_still_produce_an_edge() {
    let vectors = matrix(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

    let graph = build_knn_graph(&vectors, 20).expect("graph should build");

    assert_eq!(graph.k_neighbors(), 1);
    assert_eq!(graph.n_edges(), 1);
}

#[test]
fn single_item_graph_has_no_edges() {
    let vectors = matrix(vec![vec![1.0, 0.0]]);

    let graph = build_knn_graph(&vectors, 5).expect("graph should build");

    assert_eq!(graph.n_nodes(), 1);
    assert_eq!(graph.n_edges(), 0);
    assert_eq!(graph.k_neighbors(), 0);
}

#[test]
fn zero_k_is_a_configuration_error() {
    let vectors = matrix(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

    let err = build_knn_graph(&vectors, 0).expect_err("k=0 should be rejected");
    assert!(matches!(err, CommunityError::Configuration(_)));
}

#[test]
fn from_edges_rejects_self_loops_and_out_of_range_nodes() {
    let err = SimilarityGraph::from_edges(3, vec![(1, 1, 0.5)])
        .expect_err("self-loop should be rejected");
    assert!(matches!(err, CommunityError::Input(_)));

    let err = SimilarityGraph::from_edges(3, vec![(0, 3, 0.5)])
        .expect_err("out of range node should be rejected");
    assert!(matches!(err, CommunityError::Input(_)));
}

#[test]
fn from_edges_collapses_duplicates() {
    let graph = SimilarityGraph::from_edges(3, vec![(0, 1, 0.5), (1, 0, 0.5), (1, 2, 0.25)])
        .expect("graph should build");

    assert_eq!(graph.n_edges(), 2);
    assert!((graph.total_weight() - 0.75).abs() < 1e-12);

    let neighbors: Vec<(usize, f64)> = graph.neighbors(1).collect();
    assert_eq!(neighbors, vec![(0, 0.5), (2, 0.25)]);
    assert_eq!(graph.neighbors(7).count(), 0);
}
