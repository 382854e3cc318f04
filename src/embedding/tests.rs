use serde_json::json;

use super::*;

#[test]
fn from_rows_keeps_shape() {
    let matrix = EmbeddingMatrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
        .expect("rows should form a matrix");

    assert_eq!(matrix.n_items(), 2);
    assert_eq!(matrix.dimension(), 3);
    assert_eq!(matrix.row(1), &[4.0, 5.0, 6.0]);
    assert_eq!(matrix.rows().count(), 2);
}

#[test]
fn from_rows_rejects_dimension_mismatch() {
    let err = EmbeddingMatrix::from_rows(vec![vec![1.0, 2.0], vec![1.0]])
        .expect_err("ragged rows should be rejected");

    assert!(matches!(err, CommunityError::Input(_)));
    assert!(err.to_string().contains("embedding 1 has dimension 1, expected 2"));
}

#[test]
fn from_rows_rejects_empty_input() {
    let err = EmbeddingMatrix::from_rows(Vec::new()).expect_err("empty input should be rejected");
    assert!(matches!(err, CommunityError::Input(_)));

    let err = EmbeddingMatrix::from_rows(vec![Vec::new()])
        .expect_err("zero-dimension input should be rejected");
    assert!(matches!(err, CommunityError::Input(_)));
}

#[test]
fn from_rows_rejects_non_finite_values() {
    let err = EmbeddingMatrix::from_rows(vec![vec![1.0, f64::NAN]])
        .expect_err("NaN should be rejected");
    assert!(matches!(err, CommunityError::Input(_)));
}

#[test]
fn l2_normalization_produces_unit_rows() {
    let matrix = EmbeddingMatrix::from_rows(vec![vec![3.0, 4.0], vec![0.0, 0.0]])
        .expect("rows should form a matrix");
    let normalized = matrix.l2_normalized();

    assert!((normalized.row(0)[0] - 0.6).abs() < 1e-12);
    assert!((normalized.row(0)[1] - 0.8).abs() < 1e-12);
    // zero rows stay zero instead of becoming NaN
    assert_eq!(normalized.row(1), &[0.0, 0.0]);
}

#[test]
fn f32_rows_are_widened() {
    let matrix = EmbeddingMatrix::from_f32_rows(vec![vec![0.5_f32, -1.0]])
        .expect("f32 rows should form a matrix");
    assert_eq!(matrix.row(0), &[0.5, -1.0]);
}

#[test]
fn metadata_accessors_accept_both_naming_styles() {
    let camel: ChunkMetadata = serde_json::from_value(json!({
        "filePath": "notes/rust/ownership.md",
        "folder": "notes/rust",
        "chunkText": "Borrowing rules",
        "wordCount": 2,
        "relativePosition": 0.5
    }))
    .expect("metadata should deserialize");

    let snake: ChunkMetadata = serde_json::from_value(json!({
        "file_path": "notes/rust/ownership.md",
        "folder_path": "notes/rust",
        "chunk_text": "Borrowing rules",
        "word_count": 2,
        "relative_position": 0.5
    }))
    .expect("metadata should deserialize");

    for metadata in [&camel, &snake] {
        assert_eq!(metadata.file_path(), Some("notes/rust/ownership.md"));
        assert_eq!(metadata.folder(), Some("notes/rust"));
        assert_eq!(metadata.chunk_text(), Some("Borrowing rules"));
        assert_eq!(metadata.word_count(), Some(2));
        assert_eq!(metadata.relative_position(), Some(0.5));
    }
}

#[test]
fn metadata_preserves_field_order() {
    let metadata = ChunkMetadata::new()
        .with_field("zeta", 1)
        .with_field("alpha", 2);

    let keys: Vec<String> = metadata.into_map().into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["zeta", "alpha"]);
}
