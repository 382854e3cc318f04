use thiserror::Error;

pub type Result<T> = std::result::Result<T, CommunityError>;

#[derive(Error, Debug)]
pub enum CommunityError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Detection failed: primary algorithm: {primary}; fallback: {fallback}")]
    DetectionFailure { primary: String, fallback: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod detection;
pub mod embedding;
pub mod enrich;
pub mod export;
pub mod graph;
pub mod loader;
