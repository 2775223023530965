//! Asset prefetch pass run before any module executes.

use folio_assets::{find_asset_urls, AssetCache, AssetFetcher};
use folio_core::ModuleDescriptor;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Counts from one prefetch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchReport {
    pub attempted: usize,
    pub downloaded: usize,
    pub cached: usize,
    /// URLs that could not be resolved to a local file.
    pub unavailable: Vec<String>,
}

/// URLs a module asks for: its `assets` list, then Google links in its description.
pub fn module_asset_urls(module: &ModuleDescriptor) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for url in module
        .assets
        .iter()
        .cloned()
        .chain(find_asset_urls(&module.description))
    {
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Fetch every asset referenced by any module, active or not.
///
/// Failures are counted, never propagated.
pub async fn prefetch_assets(
    fetcher: &AssetFetcher,
    cache: &mut AssetCache,
    modules: &[ModuleDescriptor],
) -> PrefetchReport {
    let mut report = PrefetchReport::default();

    for module in modules.iter().flat_map(|m| m.walk()) {
        for url in module_asset_urls(module) {
            report.attempted += 1;
            match fetcher.try_fetch(cache, &url, Some(module.id.as_str()), None).await {
                Ok(outcome) if outcome.from_cache => report.cached += 1,
                Ok(_) => report.downloaded += 1,
                Err(e) => {
                    let error = e.into_folio(&url);
                    warn!(module_id = %module.id, error = %error, "Asset unavailable");
                    report.unavailable.push(url);
                }
            }
        }
    }

    info!(
        attempted = report.attempted,
        downloaded = report.downloaded,
        cached = report.cached,
        unavailable = report.unavailable.len(),
        "Asset prefetch complete"
    );
    report
}
