#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CommunityError, Result};

/// Dense row-major matrix of embedding vectors, one row per chunk
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    data: Vec<f64>,
    n_items: usize,
    dimension: usize,
}

impl EmbeddingMatrix {
    /// Build a matrix from per-item vectors, rejecting ragged or non-finite input
    #[inline]
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(CommunityError::Input("no embeddings to process".to_string()));
        };

        let dimension = first.len();
        if dimension == 0 {
            return Err(CommunityError::Input(
                "embeddings must have at least one dimension".to_string(),
            ));
        }

        let n_items = rows.len();
        let mut data = Vec::with_capacity(n_items * dimension);

        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != dimension {
                return Err(CommunityError::Input(format!(
                    "embedding {} has dimension {}, expected {}",
                    index,
                    row.len(),
                    dimension
                )));
            }
            if let Some(position) = row.iter().position(|value| !value.is_finite()) {
                return Err(CommunityError::Input(format!(
                    "embedding {} has a non-finite value at position {}",
                    index, position
                )));
            }
            data.extend(row);
        }

        Ok(Self {
            data,
            n_items,
            dimension,
        })
    }

    /// Build a matrix from single-precision vectors as stored in the embedding database
    #[inline]
    pub fn from_f32_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        Self::from_rows(
            rows.into_iter()
                .map(|row| row.into_iter().map(f64::from).collect())
                .collect(),
        )
    }

    #[inline]
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn row(&self, index: usize) -> &[f64] {
        let start = index * self.dimension;
        &self.data[start..start + self.dimension]
    }

    #[inline]
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.dimension)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Scale every row to unit L2 norm. Zero rows are left as zeros.
    #[inline]
    pub fn l2_normalized(&self) -> Self {
        let mut data = self.data.clone();
        for row in data.chunks_exact_mut(self.dimension) {
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row.iter_mut().for_each(|v| *v /= norm);
            }
        }

        Self {
            data,
            n_items: self.n_items,
            dimension: self.dimension,
        }
    }
}

const FILE_PATH_KEYS: &[&str] = &["filePath", "file_path", "path"];
const FOLDER_KEYS: &[&str] = &["folder", "folder_path", "folderPath"];
const CHUNK_TEXT_KEYS: &[&str] = &["chunkText", "chunk_text", "text", "content"];
const WORD_COUNT_KEYS: &[&str] = &["wordCount", "word_count"];
const RELATIVE_POSITION_KEYS: &[&str] = &["relativePosition", "relative_position"];

/// Metadata record attached to one embedding.
///
/// Arbitrary sibling fields from the input are preserved in their original
/// order. The typed accessors accept both the camelCase names written by the
/// exporter and the snake_case names used by the raw database export.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkMetadata(Map<String, Value>);

impl ChunkMetadata {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    #[inline]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[inline]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    #[inline]
    pub fn file_path(&self) -> Option<&str> {
        self.str_field(FILE_PATH_KEYS)
    }

    #[inline]
    pub fn folder(&self) -> Option<&str> {
        self.str_field(FOLDER_KEYS)
    }

    #[inline]
    pub fn chunk_text(&self) -> Option<&str> {
        self.str_field(CHUNK_TEXT_KEYS)
    }

    #[inline]
    pub fn word_count(&self) -> Option<u64> {
        self.first_field(WORD_COUNT_KEYS).and_then(Value::as_u64)
    }

    #[inline]
    pub fn relative_position(&self) -> Option<f64> {
        self.first_field(RELATIVE_POSITION_KEYS)
            .and_then(Value::as_f64)
    }

    fn first_field(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|key| self.0.get(*key))
    }

    fn str_field(&self, keys: &[&str]) -> Option<&str> {
        self.first_field(keys).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for ChunkMetadata {
    #[inline]
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
