//! Asset Cache: the JSON ledger of previously fetched assets.
//!
//! The whole ledger is read once when the cache is opened and rewritten in
//! full on every mutation. Writes go to a temp file in the same directory
//! and are renamed over the ledger, so a crash never leaves a torn file.
//! There is no locking; one writer per ledger file.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::AssetError;
use crate::kind::ResourceKind;
use crate::Result;

const PDF_MAGIC: &[u8] = b"%PDF";
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// One fetched asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetRecord {
    pub resource_id: String,
    pub local_path: PathBuf,
    pub resource_kind: ResourceKind,
    #[serde(default)]
    pub owning_module_id: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub byte_size: u64,
    #[serde(default)]
    pub source_url: String,
    /// Hex SHA-256 of the stored bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl AssetRecord {
    /// Check that the stored file is still usable.
    ///
    /// The file must exist, PDFs and PNGs must carry their magic bytes, and
    /// the digest must match when one was recorded.
    pub fn validate(&self) -> bool {
        let Ok(bytes) = fs::read(&self.local_path) else {
            return false;
        };
        let ext = self
            .local_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let magic_ok = match ext.as_deref() {
            Some("pdf") => bytes.starts_with(PDF_MAGIC),
            Some("png") => bytes.starts_with(PNG_MAGIC),
            _ => true,
        };
        let digest_ok = match &self.sha256 {
            Some(expected) => sha256_hex(&bytes) == *expected,
            None => true,
        };
        magic_ok && digest_ok
    }
}

/// Ledger bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerMetadata {
    pub created: DateTime<Utc>,
    pub total_downloads: u64,
    pub last_updated: DateTime<Utc>,
}

/// On-disk ledger document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ledger {
    pub assets: BTreeMap<String, AssetRecord>,
    pub metadata: LedgerMetadata,
}

impl Ledger {
    fn empty() -> Self {
        let now = Utc::now();
        Ledger {
            assets: BTreeMap::new(),
            metadata: LedgerMetadata {
                created: now,
                total_downloads: 0,
                last_updated: now,
            },
        }
    }
}

/// Aggregate view of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetStats {
    pub total_assets: usize,
    pub total_size_bytes: u64,
    pub by_kind: BTreeMap<ResourceKind, usize>,
    pub total_downloads: u64,
    pub last_updated: DateTime<Utc>,
}

/// In-memory ledger bound to its file.
#[derive(Debug)]
pub struct AssetCache {
    path: PathBuf,
    ledger: Ledger,
}

impl AssetCache {
    /// Load the ledger at `path`.
    ///
    /// A missing file yields an empty ledger (written on the first `put`).
    /// An unparsable file is logged and replaced by an empty ledger.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let ledger = match fs::File::open(&path) {
            Ok(mut file) => {
                let mut raw = String::new();
                file.read_to_string(&mut raw)?;
                match serde_json::from_str::<Ledger>(&raw) {
                    Ok(ledger) => ledger,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Asset ledger unreadable, starting fresh");
                        Ledger::empty()
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ledger::empty(),
            Err(e) => return Err(AssetError::Io(e)),
        };
        debug!(path = %path.display(), assets = ledger.assets.len(), "Asset ledger loaded");
        Ok(Self { path, ledger })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, resource_id: &str) -> Option<&AssetRecord> {
        self.ledger.assets.get(resource_id)
    }

    /// Insert or supersede a record and rewrite the ledger.
    pub fn put(&mut self, record: AssetRecord) -> Result<()> {
        self.ledger
            .assets
            .insert(record.resource_id.clone(), record);
        self.ledger.metadata.total_downloads += 1;
        self.flush()
    }

    /// Drop a record (the file on disk is left alone).
    pub fn remove(&mut self, resource_id: &str) -> Result<Option<AssetRecord>> {
        let removed = self.ledger.assets.remove(resource_id);
        if removed.is_some() {
            self.flush()?;
        }
        Ok(removed)
    }

    /// Records, optionally restricted to one owning module.
    pub fn records(&self, module_id: Option<&str>) -> Vec<&AssetRecord> {
        self.ledger
            .assets
            .values()
            .filter(|r| module_id.is_none() || r.owning_module_id.as_deref() == module_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ledger.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.assets.is_empty()
    }

    pub fn metadata(&self) -> &LedgerMetadata {
        &self.ledger.metadata
    }

    pub fn stats(&self) -> AssetStats {
        let mut by_kind = BTreeMap::new();
        for record in self.ledger.assets.values() {
            *by_kind.entry(record.resource_kind).or_insert(0) += 1;
        }
        AssetStats {
            total_assets: self.ledger.assets.len(),
            total_size_bytes: self.ledger.assets.values().map(|r| r.byte_size).sum(),
            by_kind,
            total_downloads: self.ledger.metadata.total_downloads,
            last_updated: self.ledger.metadata.last_updated,
        }
    }

    /// Delete assets fetched more than `max_age` before `now`, files included.
    pub fn prune_older_than(&mut self, max_age: Duration, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - max_age;
        let stale: Vec<String> = self
            .ledger
            .assets
            .values()
            .filter(|r| r.fetched_at < cutoff)
            .map(|r| r.resource_id.clone())
            .collect();

        for id in &stale {
            if let Some(record) = self.ledger.assets.remove(id) {
                match fs::remove_file(&record.local_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %record.local_path.display(), error = %e, "Could not remove stale asset"),
                }
            }
        }

        self.flush()?;
        Ok(stale.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.ledger.metadata.last_updated = Utc::now();

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let content = serde_json::to_vec_pretty(&self.ledger)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&content)?;
        tmp.persist(&self.path)
            .map_err(|e| AssetError::Ledger(format!("persist {}: {}", self.path.display(), e.error)))?;
        Ok(())
    }
}

/// Hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
