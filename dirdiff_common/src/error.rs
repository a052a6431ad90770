use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirDiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid ignore pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Walk of {path:?} failed: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DirDiffError>;
