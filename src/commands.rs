use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::config::{Config, get_config_dir, init_config, show_config};
use crate::detection::{Algorithm, AlgorithmUsed, DetectionParams, detect};
use crate::enrich::enrich;
use crate::export::{ExportDocument, default_output_path};
use crate::loader::load_path;

/// Command-line overrides for a detection run; unset fields fall back to the config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub algorithm: Option<Algorithm>,
    pub k_neighbors: Option<usize>,
    pub n_clusters: Option<usize>,
    pub seed: Option<u64>,
    /// Row limit for SQLite input, 0 for no limit
    pub limit: Option<u32>,
    /// Show a spinner on stderr while the pipeline runs
    pub show_progress: bool,
}

impl DetectOptions {
    #[inline]
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn detection_params(&self, config: &Config) -> DetectionParams {
        let mut params = config.to_detection_params();
        if let Some(algorithm) = self.algorithm {
            params.algorithm = algorithm;
        }
        if let Some(k_neighbors) = self.k_neighbors {
            params.k_neighbors = k_neighbors;
        }
        if self.n_clusters.is_some() {
            params.n_clusters = self.n_clusters;
        }
        if let Some(seed) = self.seed {
            params.seed = seed;
        }
        params
    }

    #[inline]
    pub fn database_limit(&self, config: &Config) -> Option<u32> {
        match self.limit {
            Some(0) => None,
            Some(limit) => Some(limit),
            None => config.database_limit(),
        }
    }

    #[inline]
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectReport {
    pub output_path: PathBuf,
    pub document: ExportDocument,
}

/// Load embeddings, detect communities, enrich the records and write the output document
#[inline]
pub async fn run_detect(options: &DetectOptions, config: &Config) -> Result<DetectReport> {
    let bar = if options.show_progress {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} [{elapsed}] {msg}")
                .expect("style template is valid"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    } else {
        ProgressBar::hidden()
    };

    run_detect_with_progress(options, config, &bar).await
}

/// [`run_detect`] reporting to `bar`, which is cleared whether or not the run succeeds
#[inline]
pub async fn run_detect_with_progress(
    options: &DetectOptions,
    config: &Config,
    bar: &ProgressBar,
) -> Result<DetectReport> {
    let report = detect_steps(options, config, bar).await;
    bar.finish_and_clear();
    report
}

async fn detect_steps(
    options: &DetectOptions,
    config: &Config,
    bar: &ProgressBar,
) -> Result<DetectReport> {
    info!("Detecting communities in {}", options.input.display());

    let params = options.detection_params(config);
    bar.set_message(format!("Loading {}", options.input.display()));
    let loaded = load_path(&options.input, options.database_limit(config))
        .await
        .with_context(|| format!("Failed to load embeddings from {}", options.input.display()))?;

    bar.set_message(format!(
        "Detecting communities in {} embeddings with {}",
        loaded.vectors.n_items(),
        params.algorithm
    ));
    let result = detect(&loaded.vectors, &loaded.metadata, &params)
        .context("Community detection failed")?;
    let enriched = enrich(&loaded.metadata, &result, &config.enrich)?;

    let document = ExportDocument::new(enriched, &result, loaded.source_name());
    let output_path = options.output_path();
    bar.set_message(format!("Writing {}", output_path.display()));
    document
        .write_to(&output_path, config.output.pretty)
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;

    Ok(DetectReport {
        output_path,
        document,
    })
}

/// `detect` subcommand: run with the user's configuration and print a summary
#[inline]
pub async fn detect_communities(options: DetectOptions) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let report = run_detect(&options, &config).await?;
    print_summary(&report);
    Ok(())
}

#[inline]
pub fn print_summary(report: &DetectReport) {
    let stats = &report.document.community_stats;

    eprintln!("{}", style("✅ Community detection complete!").bold().green());
    if stats.algorithm == AlgorithmUsed::Leiden {
        eprintln!("   Modularity: {}", style(format!("{:.4}", stats.modularity)).cyan());
    } else {
        eprintln!(
            "   Pseudo-modularity: {} {}",
            style(format!("{:.4}", stats.modularity)).cyan(),
            style("(heuristic, not graph modularity)").dim()
        );
    }
    eprintln!("   Communities: {}", style(stats.n_communities).cyan());
    eprintln!("   Algorithm: {}", style(stats.algorithm).cyan());
    if let Some(k_neighbors) = stats.k_neighbors {
        eprintln!("   K Neighbors: {}", style(k_neighbors).cyan());
    }

    // BTreeMap order keeps ties on the lower label
    let largest = stats
        .community_sizes
        .iter()
        .sorted_by(|a, b| b.1.cmp(a.1))
        .take(5);
    for (label, size) in largest {
        eprintln!("     #{}: {} chunks", label, size);
    }
    if stats.community_sizes.len() > 5 {
        eprintln!("     ... and {} more", stats.community_sizes.len() - 5);
    }

    eprintln!(
        "   Output: {}",
        style(report.output_path.display()).cyan()
    );
}

/// `config --show`
#[inline]
pub fn show_configuration() -> Result<()> {
    let config_dir = get_config_dir()?;
    show_config(&config_dir)
}

/// `config --init`
#[inline]
pub fn init_configuration(force: bool) -> Result<()> {
    let config_dir = get_config_dir()?;
    init_config(&config_dir, force)?;
    Ok(())
}

/// Path shown by `config` without flags
#[inline]
pub fn config_file_location() -> Result<PathBuf> {
    let config_dir = get_config_dir()?;
    Ok(Config {
        base_dir: config_dir,
        ..Default::default()
    }
    .config_file_path())
}
