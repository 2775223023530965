//! Orchestrator settings.
//!
//! Every field has a default and may be overridden through a `FOLIO_*`
//! environment variable. Relative directories resolve against `root`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Name of the asset ledger file inside the downloads directory.
pub const LEDGER_FILE_NAME: &str = "assets_database.json";

/// Folio run settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FolioConfig {
    /// Notebook root; module paths are relative to it.
    pub root: PathBuf,
    /// Module registry file.
    pub config_file: PathBuf,
    /// Where the merged document and summaries are written.
    pub output_dir: PathBuf,
    /// Where fetched assets and the ledger live.
    pub downloads_dir: PathBuf,
    /// Per-module wall-clock limit in seconds.
    pub module_timeout_secs: u64,
    /// Program used to launch module entry files. Empty runs the entry directly.
    pub interpreter: String,
    /// Entry file used when a module does not name one.
    pub default_entry: String,
    /// Prefix for output artifact names.
    pub document_name: String,
    /// Merge a directory discovery pass into the registry.
    pub discover: bool,
    /// Remove top-level files from the output directory before the run.
    pub clean_output: bool,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            config_file: PathBuf::from("module_inputs.json"),
            output_dir: PathBuf::from("output"),
            downloads_dir: PathBuf::from("downloads"),
            module_timeout_secs: 300,
            interpreter: "python3".to_string(),
            default_entry: "main.py".to_string(),
            document_name: "NOTEBOOK".to_string(),
            discover: false,
            clean_output: false,
        }
    }
}

impl FolioConfig {
    /// Build settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(root) = lookup("FOLIO_ROOT") {
            config.root = PathBuf::from(root);
        }
        if let Some(file) = lookup("FOLIO_CONFIG_FILE") {
            config.config_file = PathBuf::from(file);
        }
        if let Some(dir) = lookup("FOLIO_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("FOLIO_DOWNLOADS_DIR") {
            config.downloads_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("FOLIO_MODULE_TIMEOUT_SECS") {
            let secs = parse_u64("FOLIO_MODULE_TIMEOUT_SECS", &raw)?;
            if secs == 0 {
                return Err(invalid("FOLIO_MODULE_TIMEOUT_SECS", &raw, "must be at least 1 second"));
            }
            config.module_timeout_secs = secs;
        }
        if let Some(interpreter) = lookup("FOLIO_INTERPRETER") {
            config.interpreter = interpreter;
        }
        if let Some(entry) = lookup("FOLIO_DEFAULT_ENTRY") {
            config.default_entry = entry;
        }
        if let Some(name) = lookup("FOLIO_DOCUMENT_NAME") {
            if name.trim().is_empty() {
                return Err(invalid("FOLIO_DOCUMENT_NAME", &name, "must not be empty"));
            }
            config.document_name = name;
        }
        if let Some(raw) = lookup("FOLIO_DISCOVER") {
            config.discover = parse_flag("FOLIO_DISCOVER", &raw)?;
        }
        if let Some(raw) = lookup("FOLIO_CLEAN_OUTPUT") {
            config.clean_output = parse_flag("FOLIO_CLEAN_OUTPUT", &raw)?;
        }

        Ok(config)
    }

    /// Use a different notebook root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Absolute-or-root-relative path of the registry file.
    pub fn config_path(&self) -> PathBuf {
        self.resolve(&self.config_file)
    }

    /// Output directory resolved against the root.
    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    /// Downloads directory resolved against the root.
    pub fn downloads_path(&self) -> PathBuf {
        self.resolve(&self.downloads_dir)
    }

    /// Location of the asset ledger.
    pub fn ledger_path(&self) -> PathBuf {
        self.downloads_path().join(LEDGER_FILE_NAME)
    }

    pub fn module_timeout(&self) -> Duration {
        Duration::from_secs(self.module_timeout_secs)
    }

    /// Check that the root exists. Missing output directories are created later.
    pub fn validate(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(invalid(
                "FOLIO_ROOT",
                &self.root.display().to_string(),
                "not a directory",
            ));
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn parse_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| invalid(name, raw, &e.to_string()))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(name, raw, "expected a boolean")),
    }
}

fn invalid(name: &str, value: &str, reason: &str) -> FolioError {
    FolioError::InvalidSetting {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = FolioConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, FolioConfig::default());
        assert_eq!(config.module_timeout_secs, 300);
        assert_eq!(config.interpreter, "python3");
    }

    #[test]
    fn env_overrides_apply() {
        let config = FolioConfig::from_lookup(lookup(&[
            ("FOLIO_ROOT", "/srv/notebook"),
            ("FOLIO_MODULE_TIMEOUT_SECS", "12"),
            ("FOLIO_DISCOVER", "yes"),
            ("FOLIO_DOCUMENT_NAME", "J1_DISSERTATION"),
        ]))
        .unwrap();

        assert_eq!(config.root, PathBuf::from("/srv/notebook"));
        assert_eq!(config.module_timeout(), Duration::from_secs(12));
        assert!(config.discover);
        assert_eq!(config.document_name, "J1_DISSERTATION");
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/srv/notebook/downloads/assets_database.json")
        );
    }

    #[test]
    fn bad_timeout_is_invalid_setting() {
        let err = FolioConfig::from_lookup(lookup(&[("FOLIO_MODULE_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, FolioError::InvalidSetting { ref name, .. } if name == "FOLIO_MODULE_TIMEOUT_SECS"));
    }

    #[test]
    fn zero_timeout_is_invalid_setting() {
        let err = FolioConfig::from_lookup(lookup(&[("FOLIO_MODULE_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("at least 1 second"));
    }

    #[test]
    fn bad_flag_is_invalid_setting() {
        assert!(FolioConfig::from_lookup(lookup(&[("FOLIO_CLEAN_OUTPUT", "maybe")])).is_err());
    }

    #[test]
    fn absolute_paths_are_not_rebased() {
        let mut config = FolioConfig::default().with_root("/notebook");
        config.output_dir = PathBuf::from("/tmp/out");
        assert_eq!(config.output_path(), PathBuf::from("/tmp/out"));
        assert_eq!(config.config_path(), PathBuf::from("/notebook/module_inputs.json"));
    }

    #[test]
    fn validate_rejects_missing_root() {
        let config = FolioConfig::default().with_root("/definitely/not/here/folio");
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        assert!(FolioConfig::default().with_root(dir.path()).validate().is_ok());
    }
}
