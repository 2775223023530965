//! Error types for folio-assets

use folio_core::FolioError;
use thiserror::Error;

/// Errors that can occur while classifying, fetching or caching an asset.
#[derive(Error, Debug)]
pub enum AssetError {
    /// URL shape does not map to a known resource kind
    #[error("unrecognized asset URL: {0}")]
    Unclassified(String),

    /// URL classified but carries no Drive id
    #[error("no Drive id in URL: {0}")]
    MissingDriveId(String),

    /// Export endpoint answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Transport-level failure (DNS, TLS, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Ledger could not be read or written
    #[error("ledger error: {0}")]
    Ledger(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AssetError {
    fn from(err: reqwest::Error) -> Self {
        AssetError::Http(err.to_string())
    }
}

impl AssetError {
    /// Run-level view of a failed fetch of `url`.
    pub fn into_folio(self, url: &str) -> FolioError {
        match self {
            AssetError::Unclassified(u) => FolioError::AssetUnclassified(u),
            other => FolioError::AssetFetchFailure {
                url: url.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_folio_keeps_unclassified_distinct() {
        let err = AssetError::Unclassified("https://example.com".to_string()).into_folio("x");
        assert!(matches!(err, FolioError::AssetUnclassified(_)));

        let err = AssetError::HttpStatus {
            status: 404,
            url: "u".to_string(),
        }
        .into_folio("https://docs.google.com/document/d/a/edit");
        assert!(err.to_string().contains("HTTP 404"));
    }
}
