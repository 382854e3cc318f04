
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::database::{EmbeddingStore, database_error, is_database_path};
use crate::embedding::{ChunkMetadata, EmbeddingMatrix};
use crate::{CommunityError, Result};

pub const EMBEDDING_FIELD: &str = "embedding";
const EMBEDDINGS_SUFFIX: &str = "_embeddings.json";
const METADATA_SUFFIX: &str = "_metadata.json";

/// Embedding vectors with their parallel metadata records
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEmbeddings {
    pub vectors: EmbeddingMatrix,
    pub metadata: Vec<ChunkMetadata>,
    pub source: PathBuf,
}

impl LoadedEmbeddings {
    /// File name of the input, as recorded in the output document
    #[inline]
    pub fn source_name(&self) -> String {
        self.source
            .file_name()
            .map_or_else(|| self.source.display().to_string(), |name| {
                name.to_string_lossy().into_owned()
            })
    }
}

/// Load from a JSON file, a paired `<base>_embeddings.json`/`<base>_metadata.json`
/// export, or an SQLite store, chosen from the path.
#[inline]
pub async fn load_path(path: &Path, limit: Option<u32>) -> Result<LoadedEmbeddings> {
    if is_database_path(path) {
        return load_database(path, limit).await;
    }

    if let Some(base) = paired_export_base(path) {
        let (embeddings_path, metadata_path) = paired_export_paths(&base);
        let mut loaded = load_paired_export(&embeddings_path, &metadata_path)?;
        loaded.source = path.to_path_buf();
        return Ok(loaded);
    }

    load_json(path)
}

/// Single JSON array of objects, each carrying an `embedding` array
#[inline]
pub fn load_json(path: &Path) -> Result<LoadedEmbeddings> {
    let records: Vec<Map<String, Value>> = read_json(path)?;

    let mut rows = Vec::with_capacity(records.len());
    let mut metadata = Vec::with_capacity(records.len());
    for (index, mut record) in records.into_iter().enumerate() {
        let embedding = record.remove(EMBEDDING_FIELD).ok_or_else(|| {
            CommunityError::Input(format!("record {} has no '{}' field", index, EMBEDDING_FIELD))
        })?;
        rows.push(parse_vector(&embedding, index)?);
        metadata.push(ChunkMetadata::from_map(record));
    }

    let vectors = EmbeddingMatrix::from_rows(rows)?;
    info!(
        "Loaded {} embeddings of dimension {} from {}",
        vectors.n_items(),
        vectors.dimension(),
        path.display()
    );

    Ok(LoadedEmbeddings {
        vectors,
        metadata,
        source: path.to_path_buf(),
    })
}

#[inline]
pub fn load_paired_export(embeddings_path: &Path, metadata_path: &Path) -> Result<LoadedEmbeddings> {
    let raw_vectors: Vec<Value> = read_json(embeddings_path)?;
    let records: Vec<Map<String, Value>> = read_json(metadata_path)?;

    if raw_vectors.len() != records.len() {
        return Err(CommunityError::Input(format!(
            "{} has {} embeddings but {} has {} metadata records",
            embeddings_path.display(),
            raw_vectors.len(),
            metadata_path.display(),
            records.len()
        )));
    }

    let rows = raw_vectors
        .iter()
        .enumerate()
        .map(|(index, value)| parse_vector(value, index))
        .collect::<Result<Vec<_>>>()?;
    let vectors = EmbeddingMatrix::from_rows(rows)?;
    let metadata = records.into_iter().map(ChunkMetadata::from_map).collect();

    info!(
        "Loaded {} embeddings of dimension {} from paired export {}",
        vectors.n_items(),
        vectors.dimension(),
        embeddings_path.display()
    );

    Ok(LoadedEmbeddings {
        vectors,
        metadata,
        source: embeddings_path.to_path_buf(),
    })
}

#[inline]
pub async fn load_database(path: &Path, limit: Option<u32>) -> Result<LoadedEmbeddings> {
    let store = EmbeddingStore::open(path).await.map_err(database_error)?;
    let loaded = store.load(limit).await;
    store.close().await;
    let (vectors, metadata) = loaded?;

    Ok(LoadedEmbeddings {
        vectors,
        metadata,
        source: path.to_path_buf(),
    })
}

/// Base prefix of a paired export, if `path` names one of its files or the
/// prefix itself and both files exist. A lone `*_embeddings.json` file is
/// left to the single-file loader.
#[inline]
pub fn paired_export_base(path: &Path) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_str()?;

    let base = [EMBEDDINGS_SUFFIX, METADATA_SUFFIX]
        .into_iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .map_or_else(|| path.to_path_buf(), |stem| path.with_file_name(stem));

    let (embeddings_path, metadata_path) = paired_export_paths(&base);
    (embeddings_path.is_file() && metadata_path.is_file()).then_some(base)
}

#[inline]
pub fn paired_export_paths(base: &Path) -> (PathBuf, PathBuf) {
    let base = base.as_os_str().to_string_lossy();
    (
        PathBuf::from(format!("{}{}", base, EMBEDDINGS_SUFFIX)),
        PathBuf::from(format!("{}{}", base, METADATA_SUFFIX)),
    )
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(CommunityError::Input(format!(
            "Input file not found: {}",
            path.display()
        )));
    }

    debug!("Reading {}", path.display());
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        CommunityError::Input(format!("{} is not valid input JSON: {}", path.display(), e))
    })
}

fn parse_vector(value: &Value, index: usize) -> Result<Vec<f64>> {
    let Some(items) = value.as_array() else {
        return Err(CommunityError::Input(format!(
            "embedding {} is not an array",
            index
        )));
    };

    items
        .iter()
        .map(|item| {
            item.as_f64().ok_or_else(|| {
                CommunityError::Input(format!("embedding {} contains a non-numeric value", index))
            })
        })
        .collect()
}
