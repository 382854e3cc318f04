use super::*;
use sqlx::SqlitePool;
use tempfile::TempDir;

const TEST_SCHEMA: &str = r#"
CREATE TABLE notes (
    id INTEGER PRIMARY KEY,
    file_path TEXT NOT NULL,
    folder_path TEXT
);
CREATE TABLE chunks (
    note_id INTEGER NOT NULL REFERENCES notes(id),
    chunk_index INTEGER NOT NULL,
    word_count INTEGER,
    PRIMARY KEY (note_id, chunk_index)
);
CREATE TABLE embeddings (
    note_id INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    chunk_text TEXT,
    embedding BLOB
);
"#;

pub(crate) async fn create_test_database(temp_dir: &TempDir) -> (std::path::PathBuf, SqlitePool) {
    let db_path = temp_dir.path().join("embeddings.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true),
        )
        .await
        .expect("Failed to create test pool");

    sqlx::raw_sql(TEST_SCHEMA)
        .execute(&pool)
        .await
        .expect("Failed to create schema");

    (db_path, pool)
}

pub(crate) async fn create_test_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let (_db_path, pool) = create_test_database(&temp_dir).await;
    (temp_dir, pool)
}

pub(crate) async fn insert_chunk(
    pool: &SqlitePool,
    note_id: i64,
    file_path: &str,
    folder_path: &str,
    chunk_index: i64,
    text: &str,
    vector: &[f32],
) {
    let blob: Vec<u8> = vector.iter().flat_map(|v| v.to_le_bytes()).collect();
    let word_count = text.split_whitespace().count() as i64;

    sqlx::query("INSERT OR IGNORE INTO notes (id, file_path, folder_path) VALUES (?, ?, ?)")
        .bind(note_id)
        .bind(file_path)
        .bind(folder_path)
        .execute(pool)
        .await
        .expect("Failed to insert note");
    sqlx::query("INSERT INTO chunks (note_id, chunk_index, word_count) VALUES (?, ?, ?)")
        .bind(note_id)
        .bind(chunk_index)
        .bind(word_count)
        .execute(pool)
        .await
        .expect("Failed to insert chunk");
    sqlx::query(
        "INSERT INTO embeddings (note_id, chunk_index, chunk_text, embedding) VALUES (?, ?, ?, ?)",
    )
    .bind(note_id)
    .bind(chunk_index)
    .bind(text)
    .bind(blob)
    .execute(pool)
    .await
    .expect("Failed to insert embedding");
}

#[test]
fn test_database_extensions() {
    assert!(is_database_path(Path::new("vault/embeddings.db")));
    assert!(is_database_path(Path::new("store.SQLite3")));
    assert!(!is_database_path(Path::new("export.json")));
    assert!(!is_database_path(Path::new("no_extension")));
}

#[tokio::test]
async fn test_open_missing_database_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let result = EmbeddingStore::open(temp_dir.path().join("missing.db")).await;

    let err = result.expect_err("missing database should fail");
    assert!(err.to_string().contains("Database not found"));
}

#[tokio::test]
async fn test_load_builds_matrix_and_metadata() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let (db_path, pool) = create_test_database(&temp_dir).await;
    insert_chunk(&pool, 1, "Work/plan.md", "Work", 0, "quarterly plan", &[1.0, 0.0, 0.0]).await;
    insert_chunk(&pool, 1, "Work/plan.md", "Work", 1, "budget notes", &[0.0, 1.0, 0.0]).await;
    insert_chunk(&pool, 2, "Home/list.md", "Home", 0, "groceries", &[0.0, 0.0, 1.0]).await;
    pool.close().await;

    let store = EmbeddingStore::open(&db_path)
        .await
        .expect("Failed to open store");
    let (matrix, metadata) = store.load(None).await.expect("Failed to load");

    assert_eq!(matrix.n_items(), 3);
    assert_eq!(matrix.dimension(), 3);
    assert_eq!(matrix.row(1), &[0.0, 1.0, 0.0]);
    assert_eq!(metadata[1].file_path(), Some("Work/plan.md"));
    assert_eq!(metadata[1].relative_position(), Some(1.0));
    assert_eq!(metadata[2].folder(), Some("Home"));
    assert_eq!(metadata[2].word_count(), Some(1));
}

#[tokio::test]
async fn test_load_rejects_mismatched_dimensions() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let (db_path, pool) = create_test_database(&temp_dir).await;
    insert_chunk(&pool, 1, "a.md", "", 0, "three dims", &[1.0, 0.0, 0.0]).await;
    insert_chunk(&pool, 2, "b.md", "", 0, "two dims", &[1.0, 0.0]).await;
    insert_chunk(&pool, 3, "c.md", "", 0, "three dims", &[0.0, 0.0, 1.0]).await;
    pool.close().await;

    let store = EmbeddingStore::open(&db_path)
        .await
        .expect("Failed to open store");
    let err = store
        .load(None)
        .await
        .expect_err("mismatched dimension should fail");

    assert!(matches!(err, CommunityError::Input(_)));
    assert!(err.to_string().contains("note 2 chunk 0"));
}

#[tokio::test]
async fn test_load_rejects_undecodable_blob() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let (db_path, pool) = create_test_database(&temp_dir).await;
    insert_chunk(&pool, 1, "a.md", "", 0, "fine", &[1.0, 0.0]).await;
    insert_chunk(&pool, 1, "a.md", "", 1, "broken", &[0.0, 1.0]).await;
    sqlx::query("UPDATE embeddings SET embedding = X'010203' WHERE chunk_index = 1")
        .execute(&pool)
        .await
        .expect("Failed to corrupt embedding");
    pool.close().await;

    let store = EmbeddingStore::open(&db_path)
        .await
        .expect("Failed to open store");
    let err = store.load(None).await.expect_err("broken blob should fail");

    assert!(matches!(err, CommunityError::Input(_)));
    assert!(err.to_string().contains("note 1 chunk 1"));
}

#[tokio::test]
async fn test_load_empty_database_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let (db_path, pool) = create_test_database(&temp_dir).await;
    pool.close().await;

    let store = EmbeddingStore::open(&db_path)
        .await
        .expect("Failed to open store");
    let err = store.load(None).await.expect_err("empty store should fail");

    assert!(matches!(err, CommunityError::Input(_)));
    assert!(err.to_string().contains("No embeddings"));
}
