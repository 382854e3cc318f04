use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use embedding_communities::commands::{
    DetectOptions, config_file_location, detect_communities, init_configuration,
    show_configuration,
};
use embedding_communities::detection::Algorithm;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "embedding-communities")]
#[command(about = "Detect semantic communities in note embeddings and enrich them for visualization")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect communities in an embedding export or database
    Detect {
        /// JSON export, paired export base path, or SQLite embedding database
        input: PathBuf,
        /// Output file, defaults to <input>_communities.json
        output: Option<PathBuf>,
        /// Community detection algorithm: leiden or kmeans
        #[arg(long)]
        algorithm: Option<String>,
        /// Neighbors per chunk in the similarity graph
        #[arg(long)]
        k_neighbors: Option<usize>,
        /// Number of K-means clusters, chosen from the item count when omitted
        #[arg(long)]
        n_clusters: Option<usize>,
        /// Seed for every randomized step
        #[arg(long)]
        seed: Option<u64>,
        /// Maximum rows read from a database input, 0 for no limit
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(long, conflicts_with = "init")]
        show: bool,
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
        /// Overwrite an existing configuration file with --init
        #[arg(long, requires = "init")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            input,
            output,
            algorithm,
            k_neighbors,
            n_clusters,
            seed,
            limit,
        } => {
            let algorithm = algorithm
                .as_deref()
                .map(str::parse::<Algorithm>)
                .transpose()?;
            detect_communities(DetectOptions {
                input,
                output,
                algorithm,
                k_neighbors,
                n_clusters,
                seed,
                limit,
                show_progress: true,
            })
            .await?;
        }
        Commands::Config { show, init, force } => {
            if init {
                init_configuration(force)?;
            } else if show {
                show_configuration()?;
            } else {
                eprintln!(
                    "Config file: {}",
                    style(config_file_location()?.display()).cyan()
                );
                eprintln!("Use --show to print it or --init to create it.");
            }
        }
    }

    Ok(())
}
