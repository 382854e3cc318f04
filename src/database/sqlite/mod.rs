use anyhow::{Context, Result, bail};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::EmbeddingRow;
use crate::database::sqlite::queries::EmbeddingQueries;
use crate::CommunityError;
use crate::embedding::{ChunkMetadata, EmbeddingMatrix};

#[cfg(test)]
pub(crate) mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// File extensions that select the SQLite store as input
pub const DATABASE_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3"];

#[inline]
pub fn is_database_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DATABASE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    pool: DbPool,
}

impl EmbeddingStore {
    /// Open an existing embedding database read-only
    #[inline]
    pub async fn open<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let database_path = database_path.as_ref();
        if !database_path.is_file() {
            bail!("Database not found: {}", database_path.display());
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to open embedding database: {}",
                    database_path.display()
                )
            })?;

        debug!("Opened embedding database {}", database_path.display());
        Ok(Self { pool })
    }

    #[inline]
    pub async fn rows(&self, limit: Option<u32>) -> Result<Vec<EmbeddingRow>> {
        EmbeddingQueries::list(&self.pool, limit).await
    }

    /// Load vectors and metadata records in store order. A blob that does not
    /// decode, or whose dimension differs from the first row, rejects the
    /// whole load.
    #[inline]
    pub async fn load(
        &self,
        limit: Option<u32>,
    ) -> crate::Result<(EmbeddingMatrix, Vec<ChunkMetadata>)> {
        let rows = self.rows(limit).await.map_err(database_error)?;

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(rows.len());
        let mut metadata = Vec::with_capacity(rows.len());

        for row in &rows {
            let vector = row.vector().ok_or_else(|| {
                CommunityError::Input(format!(
                    "embedding for note {} chunk {} is not a little-endian f32 blob ({} bytes)",
                    row.note_id,
                    row.chunk_index,
                    row.embedding.len()
                ))
            })?;
            if let Some(first) = vectors.first().filter(|first| first.len() != vector.len()) {
                return Err(CommunityError::Input(format!(
                    "embedding for note {} chunk {} has dimension {}, expected {}",
                    row.note_id,
                    row.chunk_index,
                    vector.len(),
                    first.len()
                )));
            }
            vectors.push(vector);
            metadata.push(row.to_metadata());
        }

        if vectors.is_empty() {
            return Err(CommunityError::Input(
                "No embeddings found in database".to_string(),
            ));
        }

        info!("Loaded {} embeddings from database", vectors.len());
        let matrix = EmbeddingMatrix::from_f32_rows(vectors)?;
        Ok((matrix, metadata))
    }

    #[inline]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Query and connection failures, kept apart from malformed rows
#[inline]
pub fn database_error(e: anyhow::Error) -> CommunityError {
    CommunityError::Database(format!("{:#}", e))
}
