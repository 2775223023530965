//! Assembly order for produced PDFs.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use folio_core::ExecutionResult;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Priority class of a PDF, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyRank {
    Cover,
    TableOfContents,
    Section,
    References,
    Helper,
    Other,
}

impl AssemblyRank {
    /// Classify by module id, falling back to the PDF's file name.
    ///
    /// A numbered id (`02.01`, `sec3`) is a section whatever its files are
    /// called; only a `cover` or `toc`/`contents` token in the file name
    /// moves it to the front matter. Names are matched by whole tokens, so
    /// `discovery` is not a cover and `reference_data_center` inside a
    /// numbered section stays a section.
    pub fn classify(module_id: &str, pdf: &Path) -> Self {
        let id = module_id.to_ascii_lowercase();
        let file = pdf
            .file_stem()
            .and_then(|f| f.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        if let Some(rank) = Self::from_tokens(&id) {
            return rank;
        }
        if id.starts_with("0r") {
            return AssemblyRank::References;
        }
        if id.starts_with("0z") {
            return AssemblyRank::Helper;
        }
        if section_re().is_match(&id) {
            return match Self::from_tokens(&file) {
                Some(front @ (AssemblyRank::Cover | AssemblyRank::TableOfContents)) => front,
                _ => AssemblyRank::Section,
            };
        }
        Self::from_tokens(&file).unwrap_or(AssemblyRank::Other)
    }

    fn from_tokens(text: &str) -> Option<Self> {
        let tokens: Vec<&str> = text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let has = |words: &[&str]| tokens.iter().any(|t| words.contains(t));

        if has(&["cover"]) {
            Some(AssemblyRank::Cover)
        } else if has(&["toc", "contents"]) {
            Some(AssemblyRank::TableOfContents)
        } else if has(&["reference", "references", "refs"]) {
            Some(AssemblyRank::References)
        } else if has(&["helper", "helpers"]) {
            Some(AssemblyRank::Helper)
        } else {
            None
        }
    }
}

fn section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+([._\-]|$)|sec(tion)?[_\-. ]?\d)").expect("valid regex")
    })
}

/// One PDF queued for assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedPdf {
    pub module_id: String,
    pub path: PathBuf,
    pub rank: AssemblyRank,
}

/// Flatten the PDFs of successful results and order them by rank.
///
/// The sort is stable: PDFs of equal rank keep execution order, and a
/// module's own PDFs keep discovery order.
pub fn assembly_order(results: &[ExecutionResult]) -> Vec<RankedPdf> {
    let mut pdfs: Vec<RankedPdf> = results
        .iter()
        .filter(|r| r.success)
        .flat_map(|r| {
            r.pdf_files.iter().map(move |path| RankedPdf {
                module_id: r.module_id.clone(),
                path: path.clone(),
                rank: AssemblyRank::classify(&r.module_id, path),
            })
        })
        .collect();
    pdfs.sort_by_key(|p| p.rank);
    pdfs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(id: &str, files: &[&str]) -> ExecutionResult {
        ExecutionResult {
            module_id: id.to_string(),
            module_name: id.to_string(),
            module_path: PathBuf::from(id),
            success: true,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 1,
            pdf_files: files.iter().map(PathBuf::from).collect(),
            failure: None,
        }
    }

    #[test]
    fn classify_examples() {
        let p = Path::new("page.pdf");
        assert_eq!(AssemblyRank::classify("cover", p), AssemblyRank::Cover);
        assert_eq!(AssemblyRank::classify("00.00", Path::new("cover_2024.pdf")), AssemblyRank::Cover);
        assert_eq!(AssemblyRank::classify("toc", p), AssemblyRank::TableOfContents);
        assert_eq!(AssemblyRank::classify("00.01_table_of_contents", p), AssemblyRank::TableOfContents);
        assert_eq!(AssemblyRank::classify("sec01", p), AssemblyRank::Section);
        assert_eq!(AssemblyRank::classify("01.00", p), AssemblyRank::Section);
        assert_eq!(AssemblyRank::classify("0R.00", p), AssemblyRank::References);
        assert_eq!(AssemblyRank::classify("0Z.00", p), AssemblyRank::Helper);
        assert_eq!(AssemblyRank::classify("appendix", p), AssemblyRank::Other);
        assert_eq!(AssemblyRank::classify("stock", p), AssemblyRank::Other);
    }

    #[test]
    fn notebook_ids_rank_by_id_before_file_name() {
        let rank = |id: &str, file: &str| AssemblyRank::classify(id, Path::new(file));

        assert_eq!(rank("00.00", "cover_page_20250101_120000.pdf"), AssemblyRank::Cover);
        assert_eq!(
            rank("00.0B", "table_of_contents_20250101_120000.pdf"),
            AssemblyRank::TableOfContents
        );
        assert_eq!(
            rank("02.01", "reference_data_center_02.01_20250101_120000.pdf"),
            AssemblyRank::Section
        );
        assert_eq!(rank("01.0E", "model_library_helper.pdf"), AssemblyRank::Section);
        assert_eq!(rank("0R.00", "abbreviations.pdf"), AssemblyRank::References);
        assert_eq!(rank("0Z.00", "sheet_cover.pdf"), AssemblyRank::Helper);
    }

    #[test]
    fn file_names_match_whole_tokens() {
        let rank = |id: &str, file: &str| AssemblyRank::classify(id, Path::new(file));

        assert_eq!(rank("03.00", "discovery_results.pdf"), AssemblyRank::Section);
        assert_eq!(rank("appendix", "recovery_plan.pdf"), AssemblyRank::Other);
        assert_eq!(rank("appendix", "cover.pdf"), AssemblyRank::Cover);
        assert_eq!(rank("extras", "refs.pdf"), AssemblyRank::References);
    }

    #[test]
    fn order_is_priority_then_discovery() {
        let results = vec![
            ok("appendix", &["x.pdf"]),
            ok("sec02", &["s2.pdf"]),
            ok("toc", &["toc.pdf"]),
            ok("sec01", &["s1_b.pdf", "s1_a.pdf"]),
            ok("0R.00", &["refs.pdf"]),
            ok("cover", &["cover.pdf"]),
        ];
        let order: Vec<String> = assembly_order(&results)
            .into_iter()
            .map(|p| p.path.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            order,
            vec!["cover.pdf", "toc.pdf", "s2.pdf", "s1_b.pdf", "s1_a.pdf", "refs.pdf", "x.pdf"]
        );
    }

    #[test]
    fn failed_results_contribute_nothing() {
        let mut failed = ok("sec03", &["s3.pdf"]);
        failed.success = false;
        assert!(assembly_order(&[failed]).is_empty());
    }
}
