
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::Result;
use crate::detection::{AlgorithmUsed, DetectionResult};
use crate::embedding::ChunkMetadata;

const OUTPUT_SUFFIX: &str = "_communities.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityStats {
    pub modularity: f64,
    pub n_communities: usize,
    pub community_sizes: BTreeMap<usize, usize>,
    pub algorithm: AlgorithmUsed,
    pub k_neighbors: Option<usize>,
}

impl From<&DetectionResult> for CommunityStats {
    #[inline]
    fn from(result: &DetectionResult) -> Self {
        Self {
            modularity: result.modularity,
            n_communities: result.n_communities,
            community_sizes: result.community_sizes.clone(),
            algorithm: result.algorithm,
            k_neighbors: result.k_neighbors,
        }
    }
}

/// Output document: enriched records plus the run's community statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub embeddings: Vec<ChunkMetadata>,
    pub community_stats: CommunityStats,
    pub timestamp: Option<String>,
    pub source_file: String,
}

impl ExportDocument {
    #[inline]
    pub fn new(
        embeddings: Vec<ChunkMetadata>,
        result: &DetectionResult,
        source_file: impl Into<String>,
    ) -> Self {
        Self {
            embeddings,
            community_stats: CommunityStats::from(result),
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            source_file: source_file.into(),
        }
    }

    #[inline]
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Serialize fully before touching the filesystem so a failure leaves no
    /// partial output behind.
    #[inline]
    pub fn write_to(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = self.to_json(pretty)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;

        info!(
            "Wrote {} records to {}",
            self.embeddings.len(),
            path.display()
        );
        Ok(())
    }
}

/// `notes.json` becomes `notes_communities.json`; any other input gets
/// `<stem>_communities.json` in the same directory.
#[inline]
pub fn default_output_path(input: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stem = match file_name.strip_suffix(".json") {
        Some(stem) => stem.to_string(),
        None => input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "embeddings".to_string()),
    };

    input.with_file_name(format!("{}{}", stem, OUTPUT_SUFFIX))
}
