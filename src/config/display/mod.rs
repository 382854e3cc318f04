
use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use super::Config;

/// Print the effective configuration loaded from `config_dir`
#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    let detection = &config.detection;
    eprintln!("{}", style("Detection:").bold().yellow());
    eprintln!("  Algorithm: {}", style(detection.algorithm).cyan());
    eprintln!("  K Neighbors: {}", style(detection.k_neighbors).cyan());
    match detection.n_clusters {
        Some(n_clusters) => eprintln!("  Clusters: {}", style(n_clusters).cyan()),
        None => eprintln!("  Clusters: {}", style("auto").cyan()),
    }
    eprintln!("  Seed: {}", style(detection.seed).cyan());
    eprintln!("  Leiden Iterations: {}", style(detection.n_iterations).cyan());
    eprintln!("  Resolution: {}", style(detection.resolution).cyan());
    eprintln!("  K-means Restarts: {}", style(detection.n_init).cyan());
    eprintln!("  K-means Max Iterations: {}", style(detection.max_iter).cyan());

    eprintln!();
    eprintln!("{}", style("Input:").bold().yellow());
    match config.database_limit() {
        Some(limit) => eprintln!("  Database Row Limit: {}", style(limit).cyan()),
        None => eprintln!("  Database Row Limit: {}", style("none").cyan()),
    }

    eprintln!();
    eprintln!("{}", style("Output:").bold().yellow());
    eprintln!(
        "  Content Flags: {}",
        style(config.enrich.content_flags).cyan()
    );
    eprintln!("  Pretty JSON: {}", style(config.output.pretty).cyan());

    let config_path = config.config_file_path();
    eprintln!();
    if config_path.exists() {
        eprintln!("Config file: {}", style(config_path.display()).dim());
    } else {
        eprintln!(
            "Config file: {} {}",
            style(config_path.display()).dim(),
            style("(not created, using defaults)").yellow()
        );
    }

    Ok(())
}

/// Write the default configuration file. Returns `false` without touching an
/// existing file unless `force` is set.
#[inline]
pub fn init_config(config_dir: &Path, force: bool) -> Result<bool> {
    let config = Config {
        base_dir: config_dir.to_path_buf(),
        ..Default::default()
    };
    let config_path = config.config_file_path();

    if config_path.exists() && !force {
        eprintln!(
            "{} {}",
            style("⚠ Configuration already exists:").yellow(),
            style(config_path.display()).cyan()
        );
        eprintln!("Use --force to overwrite it with the defaults.");
        return Ok(false);
    }

    config.save().context("Failed to save configuration")?;
    eprintln!("{}", style("✓ Configuration saved successfully!").green());
    eprintln!(
        "Configuration saved to: {}",
        style(config_path.display()).cyan()
    );

    Ok(true)
}
