//! Export endpoint configuration.

use folio_core::FolioError;
use serde::{Deserialize, Serialize};

/// Upper bound on a single export request.
pub const MAX_TIMEOUT_SECS: u64 = 60;

/// Where export requests go and how long they may take.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetConfig {
    /// Base for drawing, document and spreadsheet exports
    pub docs_base: String,
    /// Base for direct Drive file downloads
    pub drive_base: String,
    /// Request timeout in seconds, clamped to `MAX_TIMEOUT_SECS`
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        AssetConfig {
            docs_base: "https://docs.google.com".to_string(),
            drive_base: "https://drive.google.com".to_string(),
            timeout_secs: 30,
            user_agent: format!("folio-assets/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl AssetConfig {
    /// Create a config from `FOLIO_DOCS_BASE`, `FOLIO_DRIVE_BASE` and
    /// `FOLIO_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> folio_core::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> folio_core::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let docs_base = lookup("FOLIO_DOCS_BASE").unwrap_or(defaults.docs_base);
        let drive_base = lookup("FOLIO_DRIVE_BASE").unwrap_or(defaults.drive_base);
        let mut config = Self::new(&docs_base, &drive_base);

        if let Some(raw) = lookup("FOLIO_HTTP_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| (1..=MAX_TIMEOUT_SECS).contains(secs))
                .ok_or_else(|| FolioError::InvalidSetting {
                    name: "FOLIO_HTTP_TIMEOUT_SECS".to_string(),
                    value: raw.clone(),
                    reason: format!("expected 1..={} seconds", MAX_TIMEOUT_SECS),
                })?;
            config.timeout_secs = secs;
        }
        Ok(config)
    }

    /// Point both endpoints at explicit bases (trailing slashes are dropped).
    pub fn new(docs_base: &str, drive_base: &str) -> Self {
        AssetConfig {
            docs_base: docs_base.trim_end_matches('/').to_string(),
            drive_base: drive_base.trim_end_matches('/').to_string(),
            timeout_secs: 30,
            user_agent: format!("folio-assets/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.min(MAX_TIMEOUT_SECS);
        self
    }
}
