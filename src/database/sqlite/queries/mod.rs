
use super::models::*;
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

pub struct EmbeddingQueries;

impl EmbeddingQueries {
    /// Embedded chunks in store order, at most `limit` rows when given
    #[inline]
    pub async fn list(pool: &SqlitePool, limit: Option<u32>) -> Result<Vec<EmbeddingRow>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map_or(-1, i64::from);

        let rows = sqlx::query_as::<_, EmbeddingRow>(
            r#"
            SELECT e.note_id,
                   e.chunk_index,
                   e.embedding,
                   e.chunk_text,
                   n.file_path,
                   c.word_count,
                   n.folder_path,
                   (SELECT COUNT(*) FROM chunks c2 WHERE c2.note_id = e.note_id) AS chunks_in_note
            FROM embeddings e
            JOIN chunks c ON e.note_id = c.note_id AND e.chunk_index = c.chunk_index
            JOIN notes n ON e.note_id = n.id
            WHERE e.embedding IS NOT NULL
            ORDER BY e.rowid
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to load embeddings")?;

        debug!("Fetched {} embedding rows", rows.len());
        Ok(rows)
    }
}
