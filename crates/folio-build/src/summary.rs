//! Execution summary (plain text) and run report (JSON).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use folio_core::{ExecutionResult, SkippedModule};
use serde::{Deserialize, Serialize};

use crate::prefetch::PrefetchReport;

/// Everything a run did, written next to the text summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ExecutionResult>,
    pub skipped: Vec<SkippedModule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_warning: Option<String>,
    pub assets: PrefetchReport,
    pub artifact: PathBuf,
    pub strategy: String,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn pdf_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.pdf_files.len())
            .sum()
    }
}

/// Render the human-readable execution summary.
pub fn render_summary(
    results: &[ExecutionResult],
    skipped: &[SkippedModule],
    registry_warning: Option<&str>,
    artifact: Option<&Path>,
) -> String {
    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = results.len() - succeeded;

    let mut out = String::new();
    out.push_str("NOTEBOOK EXECUTION SUMMARY\n");
    out.push_str(&"=".repeat(80));
    out.push('\n');
    out.push_str(&format!("Generated: {}\n", Utc::now().to_rfc3339()));
    out.push_str(&format!(
        "Modules run: {}  succeeded: {}  failed: {}  skipped: {}\n",
        results.len(),
        succeeded,
        failed,
        skipped.len()
    ));
    if let Some(path) = artifact {
        out.push_str(&format!("Artifact: {}\n", path.display()));
    }
    if let Some(warning) = registry_warning {
        out.push_str(&format!("WARNING: {}\n", warning));
    }
    out.push('\n');

    out.push_str(&format!(
        "{:<16} {:<8} {:<40} {:>4}  {}\n",
        "Module ID", "Status", "Path", "PDFs", "Error"
    ));
    out.push_str(&"-".repeat(80));
    out.push('\n');

    for r in results {
        let status = if r.success { "SUCCESS" } else { "FAILED" };
        out.push_str(&format!(
            "{:<16} {:<8} {:<40} {:>4}  {}\n",
            r.module_id,
            status,
            r.module_path.display(),
            r.pdf_files.len(),
            r.error_text()
        ));
    }
    for s in skipped {
        out.push_str(&format!(
            "{:<16} {:<8} {:<40} {:>4}  {}\n",
            s.module_id, "SKIPPED", "", 0, s.reason
        ));
    }
    out
}

/// Write the text summary.
pub fn write_summary(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Write the run report as pretty JSON.
pub fn write_run_report_json(path: &Path, report: &RunReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize run report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
