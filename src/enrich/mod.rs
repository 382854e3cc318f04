
use fancy_regex::Regex;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

use crate::detection::{DetectionResult, community_sizes};
use crate::embedding::ChunkMetadata;
use crate::{CommunityError, Result};

pub const COMMUNITY_FIELD: &str = "community";
pub const COMMUNITY_COLOR_FIELD: &str = "communityColor";
pub const COMMUNITY_SIZE_FIELD: &str = "communitySize";

// Keyword list of the upstream exporter plus code fences, so a fenced block
// with none of the keywords still counts as code
static CODE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(def |function|class |import|```)").expect("valid regex")
});

static LINK_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[|http").expect("valid regex"));

// `#tag`, but not markdown headings (`# Heading`) or `&#123;` entities.
// Stricter than the upstream exporter, which flags any `#`.
static TAG_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?<![\w&#])#[\p{L}\p{N}_/-]+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichOptions {
    /// Also derive `hasCode`, `hasLinks`, `hasTags`, `folderDepth` and `title`
    pub content_flags: bool,
}

impl Default for EnrichOptions {
    #[inline]
    fn default() -> Self {
        Self {
            content_flags: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentFlags {
    pub has_code: bool,
    pub has_links: bool,
    pub has_tags: bool,
}

#[inline]
pub fn content_flags(text: &str) -> ContentFlags {
    ContentFlags {
        has_code: CODE_MARKERS.is_match(text).unwrap_or(false),
        has_links: LINK_MARKERS.is_match(text).unwrap_or(false),
        has_tags: TAG_MARKERS.is_match(text).unwrap_or(false),
    }
}

/// Color per label: distinct labels sorted ascending and spread evenly over `[0, 1]`
#[inline]
pub fn community_colors(labels: &[usize]) -> BTreeMap<usize, f64> {
    let distinct: Vec<usize> = labels.iter().copied().sorted_unstable().dedup().collect();

    let denominator = distinct.len().saturating_sub(1).max(1) as f64;
    distinct
        .into_iter()
        .enumerate()
        .map(|(index, label)| (label, index as f64 / denominator))
        .collect()
}

/// Copy each metadata record and add its community id, color and size
#[inline]
pub fn enrich(
    metadata: &[ChunkMetadata],
    result: &DetectionResult,
    options: &EnrichOptions,
) -> Result<Vec<ChunkMetadata>> {
    if metadata.len() != result.labels.len() {
        return Err(CommunityError::Input(format!(
            "{} metadata records for {} community labels",
            metadata.len(),
            result.labels.len()
        )));
    }

    let colors = community_colors(&result.labels);
    let sizes = community_sizes(&result.labels);

    let enriched: Vec<ChunkMetadata> = metadata
        .iter()
        .zip(&result.labels)
        .map(|(record, &label)| {
            let mut enriched = record.clone();
            enriched.insert(COMMUNITY_FIELD, label);
            enriched.insert(COMMUNITY_COLOR_FIELD, colors[&label]);
            enriched.insert(COMMUNITY_SIZE_FIELD, sizes[&label]);
            if options.content_flags {
                add_content_fields(&mut enriched);
            }
            enriched
        })
        .collect();

    debug!(
        "Enriched {} records across {} communities",
        enriched.len(),
        colors.len()
    );
    Ok(enriched)
}

/// Derived fields are only added when the source field exists and the record
/// does not already carry a value of the same name.
fn add_content_fields(record: &mut ChunkMetadata) {
    let mut derived: Vec<(&str, serde_json::Value)> = Vec::new();

    if let Some(text) = record.chunk_text() {
        let flags = content_flags(text);
        derived.push(("hasCode", u8::from(flags.has_code).into()));
        derived.push(("hasLinks", u8::from(flags.has_links).into()));
        derived.push(("hasTags", u8::from(flags.has_tags).into()));
    }

    if let Some(folder) = record.folder() {
        derived.push(("folderDepth", folder_depth(folder).into()));
    }

    if let Some(stem) = record
        .file_path()
        .and_then(|path| Path::new(path).file_stem())
        .and_then(|stem| stem.to_str())
    {
        derived.push(("title", stem.to_string().into()));
    }

    for (key, value) in derived {
        if record.get(key).is_none() {
            record.insert(key, value);
        }
    }
}

/// Number of `/`-separated segments, so the vault root `""` has depth 1
#[inline]
pub fn folder_depth(folder: &str) -> usize {
    folder.split('/').count()
}
