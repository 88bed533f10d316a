use crate::client::CallError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Description service error: {0}")]
    Service(#[from] CallError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Stats were requested before any run persisted an output table.
    #[error("No output table at {}; run describe-all first", .0.display())]
    MissingOutput(PathBuf),

    /// Row-level: the image for a row does not resolve to a file.
    #[error("Image not found: {}", .0.display())]
    MissingFile(PathBuf),
}
