//! Document Assembler: orders produced PDFs and merges them into one artifact.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use folio_core::{emit_merge_attempt, ExecutionResult, SkippedModule};
use tracing::info;

use crate::merge::{write_manifest, GhostscriptMerger, LopdfMerger, MergeOutcome, MergeStrategy};
use crate::order::{assembly_order, RankedPdf};
use crate::summary::{render_summary, write_summary};

/// Name recorded when the text manifest stands in for a merged PDF.
pub const MANIFEST_STRATEGY: &str = "manifest";

/// What `assemble` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOutcome {
    /// Merged PDF, or the text manifest when no merger worked.
    pub artifact: PathBuf,
    pub strategy: String,
    pub summary_path: PathBuf,
    /// PDFs in the order they were handed to the merger.
    pub ordered: Vec<RankedPdf>,
    /// `YYYYmmdd_HHMMSS` suffix shared by every file of this run.
    pub stamp: String,
}

pub struct DocumentAssembler {
    output_dir: PathBuf,
    document_name: String,
    strategies: Vec<Arc<dyn MergeStrategy>>,
}

impl DocumentAssembler {
    /// Assembler with the default chain: lopdf, then Ghostscript.
    pub fn new(output_dir: impl Into<PathBuf>, document_name: impl Into<String>) -> Self {
        Self::with_strategies(
            output_dir,
            document_name,
            vec![Arc::new(LopdfMerger), Arc::new(GhostscriptMerger::default())],
        )
    }

    pub fn with_strategies(
        output_dir: impl Into<PathBuf>,
        document_name: impl Into<String>,
        strategies: Vec<Arc<dyn MergeStrategy>>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            document_name: document_name.into(),
            strategies,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path for a run file, e.g. `NOTEBOOK_REPORT_20240131_120000.json`.
    pub fn run_file(&self, label: Option<&str>, stamp: &str, extension: &str) -> PathBuf {
        let name = match label {
            Some(label) => format!("{}_{}_{}.{}", self.document_name, label, stamp, extension),
            None => format!("{}_{}.{}", self.document_name, stamp, extension),
        };
        self.output_dir.join(name)
    }

    /// Merge the PDFs of successful results and write the execution summary.
    ///
    /// Fails only when nothing could be written to the output directory.
    pub async fn assemble(
        &self,
        results: &[ExecutionResult],
        skipped: &[SkippedModule],
        registry_warning: Option<&str>,
    ) -> Result<AssemblyOutcome> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("create output directory {:?}", self.output_dir))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let ordered = assembly_order(results);
        let inputs: Vec<PathBuf> = ordered.iter().map(|p| p.path.clone()).collect();
        info!(pdfs = inputs.len(), "Assembling document");

        let pdf_target = self.run_file(None, &stamp, "pdf");
        let manifest_target = self.run_file(None, &stamp, "txt");
        let strategies = self.strategies.clone();

        let (artifact, strategy) = tokio::task::spawn_blocking(move || {
            merge_with_fallback(&strategies, &inputs, &pdf_target, &manifest_target)
        })
        .await
        .context("merge task panicked")??;

        let summary_path = self.run_file(Some("SUMMARY"), &stamp, "txt");
        let summary = render_summary(results, skipped, registry_warning, Some(&artifact));
        write_summary(&summary_path, &summary)?;

        info!(artifact = %artifact.display(), strategy = %strategy, "Document assembled");
        Ok(AssemblyOutcome {
            artifact,
            strategy,
            summary_path,
            ordered,
            stamp,
        })
    }
}

fn merge_with_fallback(
    strategies: &[Arc<dyn MergeStrategy>],
    inputs: &[PathBuf],
    pdf_target: &Path,
    manifest_target: &Path,
) -> Result<(PathBuf, String)> {
    if !inputs.is_empty() {
        for strategy in strategies {
            let outcome = strategy.merge(inputs, pdf_target);
            emit_merge_attempt(strategy.name(), outcome.as_str(), outcome.detail());
            if outcome == MergeOutcome::Merged {
                return Ok((pdf_target.to_path_buf(), strategy.name().to_string()));
            }
            // A failed strategy may leave a partial file behind.
            if pdf_target.exists() {
                let _ = fs::remove_file(pdf_target);
            }
        }
    }

    write_manifest(inputs, manifest_target)
        .with_context(|| format!("write manifest {:?}", manifest_target))?;
    emit_merge_attempt(MANIFEST_STRATEGY, "merged", "");
    Ok((manifest_target.to_path_buf(), MANIFEST_STRATEGY.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        outcome: MergeOutcome,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, outcome: MergeOutcome) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl MergeStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn merge(&self, _inputs: &[PathBuf], output: &Path) -> MergeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.outcome == MergeOutcome::Merged {
                fs::write(output, b"%PDF-merged").unwrap();
            } else {
                fs::write(output, b"partial").unwrap();
            }
            self.outcome.clone()
        }
    }

    fn ok(id: &str, pdf: PathBuf) -> ExecutionResult {
        ExecutionResult {
            module_id: id.to_string(),
            module_name: id.to_string(),
            module_path: PathBuf::from(id),
            success: true,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 1,
            pdf_files: vec![pdf],
            failure: None,
        }
    }

    #[tokio::test]
    async fn falls_through_to_first_working_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("a.pdf");
        fs::write(&pdf, b"%PDF").unwrap();

        let unavailable = Scripted::new("first", MergeOutcome::Unavailable("missing".into()));
        let failing = Scripted::new("second", MergeOutcome::Failed("bad input".into()));
        let working = Scripted::new("third", MergeOutcome::Merged);
        let chain: Vec<Arc<dyn MergeStrategy>> =
            vec![unavailable.clone(), failing.clone(), working.clone()];
        let assembler = DocumentAssembler::with_strategies(dir.path().join("out"), "THESIS", chain);

        let outcome = assembler.assemble(&[ok("cover", pdf)], &[], None).await.unwrap();

        assert_eq!(outcome.strategy, "third");
        assert_eq!(fs::read(&outcome.artifact).unwrap(), b"%PDF-merged");
        let name = outcome.artifact.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("THESIS_") && name.ends_with(".pdf"));
        assert!(outcome.summary_path.exists());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_pdfs_goes_straight_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let never = Scripted::new("never", MergeOutcome::Merged);
        let chain: Vec<Arc<dyn MergeStrategy>> = vec![never.clone()];
        let assembler = DocumentAssembler::with_strategies(dir.path(), "NOTEBOOK", chain);

        let outcome = assembler.assemble(&[], &[], Some("no registry")).await.unwrap();

        assert_eq!(outcome.strategy, MANIFEST_STRATEGY);
        assert!(outcome.artifact.extension().unwrap() == "txt");
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
        let summary = fs::read_to_string(&outcome.summary_path).unwrap();
        assert!(summary.contains("WARNING: no registry"));
    }

    #[tokio::test]
    async fn all_strategies_failing_leaves_manifest_only() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("a.pdf");
        fs::write(&pdf, b"%PDF").unwrap();
        let failing: Arc<dyn MergeStrategy> =
            Scripted::new("broken", MergeOutcome::Failed("boom".into()));
        let assembler =
            DocumentAssembler::with_strategies(dir.path().join("out"), "NOTEBOOK", vec![failing]);

        let outcome = assembler.assemble(&[ok("sec01", pdf)], &[], None).await.unwrap();

        assert_eq!(outcome.strategy, MANIFEST_STRATEGY);
        assert!(!assembler.run_file(None, &outcome.stamp, "pdf").exists());
        assert!(fs::read_to_string(&outcome.artifact).unwrap().contains("a.pdf"));
    }

    #[test]
    fn run_file_names() {
        let assembler = DocumentAssembler::new("/out", "NOTEBOOK");
        assert_eq!(
            assembler.run_file(Some("REPORT"), "20240131_120000", "json"),
            PathBuf::from("/out/NOTEBOOK_REPORT_20240131_120000.json")
        );
        assert_eq!(
            assembler.run_file(None, "20240131_120000", "pdf"),
            PathBuf::from("/out/NOTEBOOK_20240131_120000.pdf")
        );
    }
}
