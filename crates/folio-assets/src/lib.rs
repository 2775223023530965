//! Folio Assets
//!
//! Downloads externally hosted figures and documents (Google Drawings,
//! Docs, Sheets and Drive files) and records them in a JSON ledger so
//! stable resources are fetched once.

pub mod config;
pub mod error;
pub mod fakes;
pub mod fetcher;
pub mod kind;
pub mod ledger;
pub mod transport;

pub use config::AssetConfig;
pub use error::AssetError;
pub use fetcher::{AssetFetcher, FetchOutcome};
pub use kind::{classify_url, find_asset_urls, CachePolicy, ClassifiedUrl, ResourceKind};
pub use ledger::{AssetCache, AssetRecord, AssetStats};
pub use transport::{HttpTransport, ReqwestTransport};

/// Result type for asset operations
pub type Result<T> = std::result::Result<T, AssetError>;
