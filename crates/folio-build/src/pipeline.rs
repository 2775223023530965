//! Notebook run orchestration.
//!
//! A run walks `Init -> RegistryLoaded -> AssetsPrefetched -> ModulesExecuted
//! -> Assembled -> Done` exactly once. Module and asset problems are
//! recorded and the run keeps going; only an output directory that cannot
//! be written ends it early.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use folio_assets::{AssetCache, AssetConfig, AssetFetcher};
use folio_core::{emit_phase_entered, run_span, FolioConfig, FolioError, RunPhase, METRICS};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::assembler::{AssemblyOutcome, DocumentAssembler};
use crate::executor::ModuleExecutor;
use crate::prefetch::{prefetch_assets, PrefetchReport};
use crate::registry::Registry;
use crate::summary::{write_run_report_json, RunReport};
use crate::task::{ProcessExecutor, TaskExecutor};

/// Outcome of a complete run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub report: RunReport,
    pub assembly: AssemblyOutcome,
    pub report_path: std::path::PathBuf,
    pub phase: RunPhase,
}

impl PipelineResult {
    pub fn run_id(&self) -> &str {
        &self.report.run_id
    }

    pub fn passed_count(&self) -> usize {
        self.report.succeeded()
    }

    pub fn failed_count(&self) -> usize {
        self.report.failed()
    }
}

pub struct NotebookPipeline {
    config: FolioConfig,
    runner: Arc<dyn TaskExecutor>,
    fetcher: AssetFetcher,
    assembler: DocumentAssembler,
}

impl NotebookPipeline {
    pub fn new(config: FolioConfig, runner: Arc<dyn TaskExecutor>, fetcher: AssetFetcher) -> Self {
        let assembler = DocumentAssembler::new(config.output_path(), config.document_name.clone());
        Self {
            config,
            runner,
            fetcher,
            assembler,
        }
    }

    /// Production wiring: child processes and HTTP downloads.
    pub fn from_config(config: FolioConfig) -> Result<Self> {
        let assets = AssetConfig::from_env()?;
        let fetcher = AssetFetcher::with_reqwest(assets, config.downloads_path())
            .context("build HTTP client")?;
        Ok(Self::new(config, Arc::new(ProcessExecutor), fetcher))
    }

    pub fn with_assembler(mut self, assembler: DocumentAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4().to_string();
        let span = run_span(&run_id);
        self.run_phases(run_id).instrument(span).await
    }

    async fn run_phases(&self, run_id: String) -> Result<PipelineResult> {
        let started_at = Utc::now();
        let mut phase = RunPhase::Init;
        emit_phase_entered(phase);
        info!(root = %self.config.root.display(), "Starting notebook run");

        if self.config.clean_output {
            self.clean_output_dir();
        }

        let (registry, registry_warning) = self.load_registry();
        phase = advance(phase);

        let assets = self.prefetch(&registry).await;
        phase = advance(phase);

        let executor = ModuleExecutor::new(self.runner.clone(), self.config.clone());
        let execution = executor.execute_all(registry.modules()).await;
        phase = advance(phase);

        let assembly = self
            .assembler
            .assemble(&execution.results, &execution.skipped, registry_warning.as_deref())
            .await?;
        phase = advance(phase);

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            results: execution.results,
            skipped: execution.skipped,
            registry_warning,
            assets,
            artifact: assembly.artifact.clone(),
            strategy: assembly.strategy.clone(),
        };
        let report_path = self.assembler.run_file(Some("REPORT"), &assembly.stamp, "json");
        write_run_report_json(&report_path, &report)?;

        METRICS.flush();
        phase = advance(phase);
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped.len(),
            artifact = %report.artifact.display(),
            "Notebook run complete"
        );

        Ok(PipelineResult {
            report,
            assembly,
            report_path,
            phase,
        })
    }

    fn load_registry(&self) -> (Registry, Option<String>) {
        match Registry::load(&self.config) {
            Ok(registry) => (registry, None),
            Err(e) => {
                let e = FolioError::from(e);
                warn!(error = %e, "Registry unavailable, continuing");
                let fallback = if self.config.discover {
                    Registry::discover(&self.config.root, &self.config.default_entry)
                        .unwrap_or_else(|e| {
                            warn!(error = %e, "Discovery failed");
                            Registry::empty()
                        })
                } else {
                    Registry::empty()
                };
                (fallback, Some(e.to_string()))
            }
        }
    }

    async fn prefetch(&self, registry: &Registry) -> PrefetchReport {
        if registry.is_empty() {
            return PrefetchReport::default();
        }
        let mut cache = match AssetCache::open(self.config.ledger_path()) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "Asset ledger unavailable, skipping prefetch");
                return PrefetchReport::default();
            }
        };
        prefetch_assets(&self.fetcher, &mut cache, registry.modules()).await
    }

    /// Remove files (not folders) directly under the output directory.
    fn clean_output_dir(&self) {
        let dir = self.config.output_path();
        let Ok(entries) = fs::read_dir(&dir) else {
            return;
        };
        let mut removed = 0usize;
        for entry in entries.filter_map(|e| e.ok()) {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %entry.path().display(), error = %e, "Could not remove old output"),
                }
            }
        }
        info!(dir = %dir.display(), removed, "Output directory cleaned");
    }
}

fn advance(phase: RunPhase) -> RunPhase {
    let next = phase.next().unwrap_or(phase);
    emit_phase_entered(next);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::InProcessExecutor;
    use folio_assets::fakes::FakeTransport;

    fn pipeline(config: FolioConfig) -> NotebookPipeline {
        let fetcher = AssetFetcher::new(
            Arc::new(FakeTransport::new()),
            AssetConfig::new("http://docs.test", "http://drive.test"),
            config.downloads_path(),
        );
        NotebookPipeline::new(config, Arc::new(InProcessExecutor::new()), fetcher)
    }

    #[tokio::test]
    async fn missing_registry_still_produces_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = FolioConfig::default().with_root(dir.path());

        let result = pipeline(config).run().await.unwrap();

        assert_eq!(result.phase, RunPhase::Done);
        assert!(result.report.results.is_empty());
        assert!(result.report.registry_warning.is_some());
        assert!(result.assembly.artifact.exists());
        assert!(result.assembly.summary_path.exists());
        assert!(result.report_path.exists());
        assert!(!result.run_id().is_empty());
    }

    #[tokio::test]
    async fn clean_output_removes_top_level_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        fs::create_dir_all(out.join("keep")).unwrap();
        fs::write(out.join("old.pdf"), b"%PDF").unwrap();
        fs::write(out.join("keep").join("nested.pdf"), b"%PDF").unwrap();

        let mut config = FolioConfig::default().with_root(dir.path());
        config.clean_output = true;
        pipeline(config).run().await.unwrap();

        assert!(!out.join("old.pdf").exists());
        assert!(out.join("keep").join("nested.pdf").exists());
    }
}
