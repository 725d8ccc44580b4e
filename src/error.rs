use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Broadcast file not found: {}", .0.display())]
    MissingBroadcast(PathBuf),

    #[error("Broadcast file is empty: {}", .0.display())]
    EmptyBroadcast(PathBuf),

    #[error("Malformed line in {source_name}: {line}")]
    MalformedLine { source_name: String, line: String },

    #[error("Phase 1 output at {} is incomplete (no _SUCCESS marker)", .0.display())]
    PhaseIncomplete(PathBuf),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
