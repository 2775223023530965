//! Run-level error taxonomy for Folio.

use std::path::PathBuf;

/// Folio errors.
///
/// Module and asset variants are normally converted into negative result
/// records by the pipeline; only configuration and I/O failures that leave
/// the run without any artifact surface to the binary.
#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("module {module_id} entry point not found: {path}")]
    ModuleNotFound { module_id: String, path: PathBuf },

    #[error("module {module_id} timed out after {timeout_secs}s")]
    ModuleTimeout { module_id: String, timeout_secs: u64 },

    #[error("module {module_id} exited with code {exit_code}")]
    ModuleRuntimeFailure { module_id: String, exit_code: i32 },

    #[error("asset fetch failed for {url}: {reason}")]
    AssetFetchFailure { url: String, reason: String },

    #[error("asset URL could not be classified: {0}")]
    AssetUnclassified(String),

    #[error("merge capability unavailable: {0}")]
    MergeCapabilityUnavailable(String),

    #[error("invalid setting {name}={value}: {reason}")]
    InvalidSetting {
        name: String,
        value: String,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Folio operations.
pub type Result<T> = std::result::Result<T, FolioError>;
