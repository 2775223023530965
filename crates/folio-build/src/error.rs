//! Error types for folio-build

use std::path::PathBuf;

use folio_core::FolioError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    /// Registry file missing or malformed
    #[error("configuration error in {path}: {reason}")]
    Configuration { path: PathBuf, reason: String },

    #[error("task {0} has an empty command")]
    EmptyCommand(String),

    /// The child process could not be started
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BuildError> for FolioError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Configuration { path, reason } => {
                FolioError::Configuration(format!("{}: {}", path.display(), reason))
            }
            BuildError::Io(e) => FolioError::Io(e),
            other => FolioError::Configuration(other.to_string()),
        }
    }
}

/// Result type for build operations
pub type Result<T> = std::result::Result<T, BuildError>;
