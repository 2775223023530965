//! URL classification and per-kind retrieval rules.

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::AssetConfig;
use crate::error::AssetError;
use crate::Result;

/// Kind of externally hosted resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Google Drawing, exported as PNG
    Drawing,
    /// Google Doc, exported as PDF
    Document,
    /// Google Sheet, exported as PDF
    Spreadsheet,
    /// Raw Drive file (CSV exports and the like)
    File,
}

/// Whether a ledger hit may stand in for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Reuse the cached copy while its file exists.
    Reuse,
    /// Always download; the source changes between runs.
    AlwaysRefresh,
}

/// A single HTTP GET against an export endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub url: String,
    pub referer: Option<String>,
    pub accept: Option<&'static str>,
}

/// Result of classifying a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedUrl {
    pub kind: ResourceKind,
    /// Drive id; unique key in the ledger.
    pub resource_id: String,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Drawing => "drawing",
            ResourceKind::Document => "document",
            ResourceKind::Spreadsheet => "spreadsheet",
            ResourceKind::File => "file",
        }
    }

    /// Derive the kind from URL shape alone.
    ///
    /// Slides and Forms links are recognised as Google URLs but have no
    /// export rule, so they classify as `None` like any foreign URL.
    pub fn from_url(url: &str) -> Option<ResourceKind> {
        if url.contains("drawings") {
            Some(ResourceKind::Drawing)
        } else if url.contains("document") {
            Some(ResourceKind::Document)
        } else if url.contains("spreadsheets") {
            Some(ResourceKind::Spreadsheet)
        } else if url.contains("presentation") || url.contains("forms") {
            None
        } else if url.contains("file/d/")
            || query_id_re().is_match(url)
            || bare_id_re().is_match(url.trim())
        {
            Some(ResourceKind::File)
        } else {
            None
        }
    }

    /// Cache policy for this kind.
    ///
    /// Drawings are edited live and always refreshed. Files are refreshed
    /// when the caller asks for a `.csv` target; everything else is reused.
    pub fn cache_policy(&self, filename: Option<&str>) -> CachePolicy {
        match self {
            ResourceKind::Drawing => CachePolicy::AlwaysRefresh,
            ResourceKind::File if filename.map(is_csv).unwrap_or(false) => {
                CachePolicy::AlwaysRefresh
            }
            ResourceKind::Document | ResourceKind::Spreadsheet | ResourceKind::File => {
                CachePolicy::Reuse
            }
        }
    }

    /// File name used when the caller does not supply one.
    pub fn default_filename(&self, resource_id: &str) -> String {
        match self {
            ResourceKind::Drawing => format!("drawing_{}.png", resource_id),
            ResourceKind::Document => format!("doc_{}.pdf", resource_id),
            ResourceKind::Spreadsheet => format!("sheet_{}.pdf", resource_id),
            ResourceKind::File => format!("google_file_{}.csv", resource_id),
        }
    }

    /// Export endpoint for a resource of this kind.
    pub fn export_request(&self, resource_id: &str, config: &AssetConfig) -> ExportRequest {
        match self {
            ResourceKind::Drawing => ExportRequest {
                url: format!("{}/drawings/d/{}/export/png", config.docs_base, resource_id),
                referer: Some(format!("{}/drawings/d/{}/edit", config.docs_base, resource_id)),
                accept: Some("image/png,image/*,*/*;q=0.8"),
            },
            ResourceKind::Document => ExportRequest {
                url: format!("{}/document/d/{}/export?format=pdf", config.docs_base, resource_id),
                referer: None,
                accept: Some("application/pdf"),
            },
            ResourceKind::Spreadsheet => ExportRequest {
                url: format!(
                    "{}/spreadsheets/d/{}/export?format=pdf",
                    config.docs_base, resource_id
                ),
                referer: None,
                accept: Some("application/pdf"),
            },
            ResourceKind::File => ExportRequest {
                url: format!("{}/uc?export=download&id={}", config.drive_base, resource_id),
                referer: None,
                accept: None,
            },
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a URL and pull out its Drive id.
pub fn classify_url(url: &str) -> Result<ClassifiedUrl> {
    let kind =
        ResourceKind::from_url(url).ok_or_else(|| AssetError::Unclassified(url.to_string()))?;
    let resource_id =
        extract_drive_id(url).ok_or_else(|| AssetError::MissingDriveId(url.to_string()))?;
    Ok(ClassifiedUrl { kind, resource_id })
}

/// Extract a Drive id from `/d/<id>`, `?id=<id>` or a bare id.
pub fn extract_drive_id(url: &str) -> Option<String> {
    if let Some(caps) = path_id_re().captures(url) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = query_id_re().captures(url) {
        return Some(caps[1].to_string());
    }
    let trimmed = url.trim();
    if bare_id_re().is_match(trimmed) {
        return Some(trimmed.to_string());
    }
    None
}

/// Google Docs/Drive URLs embedded in free text, in order of appearance.
pub fn find_asset_urls(text: &str) -> Vec<String> {
    embedded_url_re()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(|c: char| matches!(c, '.' | ',' | ';')).to_string())
        .collect()
}

fn is_csv(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn path_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/d/([A-Za-z0-9_-]+)").expect("valid regex"))
}

fn query_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]id=([A-Za-z0-9_-]+)").expect("valid regex"))
}

fn bare_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{25,}$").expect("valid regex"))
}

fn embedded_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https://(?:docs|drive)\.google\.com/[^\s"'<>)]+"#).expect("valid regex")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRAWING: &str =
        "https://docs.google.com/drawings/d/1Mx3Uug0W3zOUvEeE9tmppbM0gTn-0mD_vgZJv6hXcCo/edit";

    #[test]
    fn classifies_by_url_shape() {
        assert_eq!(ResourceKind::from_url(DRAWING), Some(ResourceKind::Drawing));
        assert_eq!(
            ResourceKind::from_url("https://docs.google.com/document/d/abc123/edit"),
            Some(ResourceKind::Document)
        );
        assert_eq!(
            ResourceKind::from_url("https://docs.google.com/spreadsheets/d/abc123/edit#gid=0"),
            Some(ResourceKind::Spreadsheet)
        );
        assert_eq!(
            ResourceKind::from_url("https://drive.google.com/file/d/abc123/view"),
            Some(ResourceKind::File)
        );
        assert_eq!(
            ResourceKind::from_url("https://drive.google.com/open?id=abc123"),
            Some(ResourceKind::File)
        );
        assert_eq!(
            ResourceKind::from_url("1AbCdEfGhIjKlMnOpQrStUvWxYz0123456"),
            Some(ResourceKind::File)
        );
    }

    #[test]
    fn unknown_shapes_are_unclassified() {
        assert_eq!(ResourceKind::from_url("https://example.com/figure.png"), None);
        assert_eq!(
            ResourceKind::from_url("https://docs.google.com/presentation/d/abc/edit"),
            None
        );
        assert!(matches!(
            classify_url("https://example.com/x"),
            Err(AssetError::Unclassified(_))
        ));
    }

    #[test]
    fn extracts_drive_ids() {
        assert_eq!(
            extract_drive_id(DRAWING).as_deref(),
            Some("1Mx3Uug0W3zOUvEeE9tmppbM0gTn-0mD_vgZJv6hXcCo")
        );
        assert_eq!(
            extract_drive_id("https://drive.google.com/uc?export=download&id=XYZ_9").as_deref(),
            Some("XYZ_9")
        );
        assert_eq!(extract_drive_id("https://docs.google.com/document/"), None);
    }

    #[test]
    fn document_without_id_is_missing_drive_id() {
        assert!(matches!(
            classify_url("https://docs.google.com/document/u/0/"),
            Err(AssetError::MissingDriveId(_))
        ));
    }

    #[test]
    fn cache_policy_is_asymmetric() {
        assert_eq!(ResourceKind::Drawing.cache_policy(None), CachePolicy::AlwaysRefresh);
        assert_eq!(ResourceKind::Document.cache_policy(None), CachePolicy::Reuse);
        assert_eq!(ResourceKind::Spreadsheet.cache_policy(Some("x.pdf")), CachePolicy::Reuse);
        assert_eq!(ResourceKind::File.cache_policy(Some("data.CSV")), CachePolicy::AlwaysRefresh);
        assert_eq!(ResourceKind::File.cache_policy(Some("data.xlsx")), CachePolicy::Reuse);
        assert_eq!(ResourceKind::File.cache_policy(None), CachePolicy::Reuse);
    }

    #[test]
    fn export_urls_follow_kind() {
        let config = AssetConfig::new("https://docs.google.com", "https://drive.google.com");
        let drawing = ResourceKind::Drawing.export_request("ID", &config);
        assert_eq!(drawing.url, "https://docs.google.com/drawings/d/ID/export/png");
        assert_eq!(
            drawing.referer.as_deref(),
            Some("https://docs.google.com/drawings/d/ID/edit")
        );
        assert_eq!(
            ResourceKind::Spreadsheet.export_request("ID", &config).url,
            "https://docs.google.com/spreadsheets/d/ID/export?format=pdf"
        );
        assert_eq!(
            ResourceKind::File.export_request("ID", &config).url,
            "https://drive.google.com/uc?export=download&id=ID"
        );
    }

    #[test]
    fn finds_urls_in_descriptions() {
        let text = "Figure source: https://docs.google.com/drawings/d/abc/edit. \
                    Data (https://drive.google.com/file/d/def/view) and notes.";
        assert_eq!(
            find_asset_urls(text),
            vec![
                "https://docs.google.com/drawings/d/abc/edit".to_string(),
                "https://drive.google.com/file/d/def/view".to_string(),
            ]
        );
    }
}
