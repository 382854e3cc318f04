
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::embedding::ChunkMetadata;

/// One embedded chunk joined with its chunk and note rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EmbeddingRow {
    pub note_id: i64,
    pub chunk_index: i64,
    pub embedding: Vec<u8>,
    pub chunk_text: Option<String>,
    pub file_path: Option<String>,
    pub word_count: Option<i64>,
    pub folder_path: Option<String>,
    pub chunks_in_note: i64,
}

impl EmbeddingRow {
    /// Decode the little-endian f32 blob. `None` if the blob is empty or not a
    /// whole number of f32 values.
    #[inline]
    pub fn vector(&self) -> Option<Vec<f32>> {
        decode_f32_blob(&self.embedding)
    }

    /// Position of the chunk inside its note, from 0.0 (first) to 1.0 (last)
    #[inline]
    pub fn relative_position(&self) -> f64 {
        let last_index = (self.chunks_in_note - 1).max(1);
        self.chunk_index as f64 / last_index as f64
    }

    #[inline]
    pub fn to_metadata(&self) -> ChunkMetadata {
        ChunkMetadata::new()
            .with_field("chunkText", optional(self.chunk_text.clone()))
            .with_field("filePath", optional(self.file_path.clone()))
            .with_field("wordCount", optional(self.word_count))
            .with_field("folder", optional(self.folder_path.clone()))
            .with_field("noteId", self.note_id)
            .with_field("chunkIndex", self.chunk_index)
            .with_field("relativePosition", self.relative_position())
    }
}

fn optional<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}

#[inline]
pub fn decode_f32_blob(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.is_empty() || blob.len() % 4 != 0 {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect(),
    )
}
