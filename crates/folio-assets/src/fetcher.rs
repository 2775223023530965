//! Asset Fetcher: resolves a URL to a local file, consulting the ledger.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use folio_core::{emit_asset_cache_hit, emit_asset_fetched, METRICS};
use tracing::{debug, warn};

use crate::config::AssetConfig;
use crate::kind::{classify_url, CachePolicy, ResourceKind};
use crate::ledger::{sha256_hex, AssetCache, AssetRecord};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::Result;

/// What a successful fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub path: PathBuf,
    pub kind: ResourceKind,
    pub resource_id: String,
    /// Served from the ledger without touching the network.
    pub from_cache: bool,
    pub byte_size: u64,
}

pub struct AssetFetcher {
    transport: Arc<dyn HttpTransport>,
    config: AssetConfig,
    download_dir: PathBuf,
}

impl AssetFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: AssetConfig,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            config,
            download_dir: download_dir.into(),
        }
    }

    /// Fetcher backed by `reqwest`.
    pub fn with_reqwest(config: AssetConfig, download_dir: impl Into<PathBuf>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::new(transport, config, download_dir))
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Resolve `url` to a local path, or `None` if it cannot be had.
    ///
    /// Every failure is logged and swallowed; a missing asset never stops a run.
    pub async fn fetch(
        &self,
        cache: &mut AssetCache,
        url: &str,
        module_id: Option<&str>,
        filename: Option<&str>,
    ) -> Option<PathBuf> {
        match self.try_fetch(cache, url, module_id, filename).await {
            Ok(outcome) => Some(outcome.path),
            Err(e) => {
                let error = e.into_folio(url);
                warn!(module_id = ?module_id, error = %error, "Asset unavailable");
                None
            }
        }
    }

    pub async fn try_fetch(
        &self,
        cache: &mut AssetCache,
        url: &str,
        module_id: Option<&str>,
        filename: Option<&str>,
    ) -> Result<FetchOutcome> {
        let classified = classify_url(url)?;
        let kind = classified.kind;
        let resource_id = classified.resource_id;

        if kind.cache_policy(filename) == CachePolicy::Reuse {
            if let Some(record) = cache.get(&resource_id) {
                if record.local_path.exists() {
                    emit_asset_cache_hit(&resource_id, kind.as_str());
                    METRICS.inc_asset_cache_hits();
                    return Ok(FetchOutcome {
                        path: record.local_path.clone(),
                        kind,
                        resource_id,
                        from_cache: true,
                        byte_size: record.byte_size,
                    });
                }
            }
            if cache.get(&resource_id).is_some() {
                debug!(resource_id = %resource_id, "Ledger entry points at a missing file, refetching");
                if let Err(e) = cache.remove(&resource_id) {
                    warn!(resource_id = %resource_id, error = %e, "Stale ledger entry not removed");
                }
            }
        }

        let request = kind.export_request(&resource_id, &self.config);
        let body = self.transport.get(&request).await?;

        let target = self.target_path(kind, &resource_id, module_id, filename);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &body)?;

        let byte_size = body.len() as u64;
        emit_asset_fetched(&resource_id, kind.as_str(), byte_size);
        METRICS.inc_assets_downloaded();

        let record = AssetRecord {
            resource_id: resource_id.clone(),
            local_path: target.clone(),
            resource_kind: kind,
            owning_module_id: module_id.map(str::to_string),
            fetched_at: Utc::now(),
            byte_size,
            source_url: url.to_string(),
            sha256: Some(sha256_hex(&body)),
        };
        if let Err(e) = cache.put(record) {
            warn!(resource_id = %resource_id, error = %e, "Downloaded asset not recorded in ledger");
        }

        Ok(FetchOutcome {
            path: target,
            kind,
            resource_id,
            from_cache: false,
            byte_size,
        })
    }

    fn target_path(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        module_id: Option<&str>,
        filename: Option<&str>,
    ) -> PathBuf {
        let dir = match module_id {
            Some(id) => self.download_dir.join(id),
            None => self.download_dir.clone(),
        };
        let name = filename
            .map(str::to_string)
            .unwrap_or_else(|| kind.default_filename(resource_id));
        dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeTransport;

    fn fetcher(transport: Arc<FakeTransport>, dir: &Path) -> AssetFetcher {
        AssetFetcher::new(
            transport,
            AssetConfig::new("http://docs.test", "http://drive.test"),
            dir.join("downloads"),
        )
    }

    #[tokio::test]
    async fn writes_into_module_subdirectory_with_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(
            FakeTransport::new().respond("http://docs.test/document/d/DOC1/export?format=pdf", b"%PDF-1.4"),
        );
        let fetcher = fetcher(transport.clone(), dir.path());
        let mut cache = AssetCache::open(dir.path().join("ledger.json")).unwrap();

        let outcome = fetcher
            .try_fetch(
                &mut cache,
                "https://docs.google.com/document/d/DOC1/edit",
                Some("02.0_Methods"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.path,
            dir.path().join("downloads").join("02.0_Methods").join("doc_DOC1.pdf")
        );
        assert!(!outcome.from_cache);
        let record = cache.get("DOC1").unwrap();
        assert_eq!(record.owning_module_id.as_deref(), Some("02.0_Methods"));
        assert_eq!(record.sha256.as_deref(), Some(sha256_hex(b"%PDF-1.4").as_str()));
        assert!(record.validate());
    }

    #[tokio::test]
    async fn drawing_request_carries_referer() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(
            FakeTransport::new().respond("http://docs.test/drawings/d/DRW/export/png", b"png"),
        );
        let fetcher = fetcher(transport.clone(), dir.path());
        let mut cache = AssetCache::open(dir.path().join("ledger.json")).unwrap();

        let path = fetcher
            .fetch(&mut cache, "https://docs.google.com/drawings/d/DRW/edit", None, Some("fig.png"))
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "fig.png");
        let requests = transport.requests();
        assert_eq!(
            requests[0].referer.as_deref(),
            Some("http://docs.test/drawings/d/DRW/edit")
        );
    }

    #[tokio::test]
    async fn stale_entry_is_dropped_when_refetch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://docs.google.com/document/d/GONE/edit";
        let mut cache = AssetCache::open(dir.path().join("ledger.json")).unwrap();
        cache
            .put(AssetRecord {
                resource_id: "GONE".to_string(),
                local_path: dir.path().join("downloads").join("doc_GONE.pdf"),
                resource_kind: ResourceKind::Document,
                owning_module_id: None,
                fetched_at: Utc::now(),
                byte_size: 4,
                source_url: url.to_string(),
                sha256: None,
            })
            .unwrap();

        let transport = Arc::new(
            FakeTransport::new().fail("http://docs.test/document/d/GONE/export?format=pdf", 500),
        );
        let fetcher = fetcher(transport.clone(), dir.path());

        assert!(fetcher.fetch(&mut cache, url, None, None).await.is_none());
        assert_eq!(transport.calls(), 1);
        assert!(cache.get("GONE").is_none());

        let reopened = AssetCache::open(dir.path().join("ledger.json")).unwrap();
        assert!(reopened.is_empty());
    }

    #[tokio::test]
    async fn missing_cached_file_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(
            FakeTransport::new().respond("http://docs.test/spreadsheets/d/SH/export?format=pdf", b"%PDF"),
        );
        let fetcher = fetcher(transport.clone(), dir.path());
        let mut cache = AssetCache::open(dir.path().join("ledger.json")).unwrap();
        let url = "https://docs.google.com/spreadsheets/d/SH/edit";

        let first = fetcher.fetch(&mut cache, url, None, None).await.unwrap();
        fs::remove_file(&first).unwrap();
        let second = fetcher.fetch(&mut cache, url, None, None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls(), 2);
        assert!(second.exists());
    }
}
