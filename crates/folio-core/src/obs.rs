//! Structured lifecycle events for a notebook run.
//!
//! Every helper logs one event carrying an `event = "..."` field so log
//! consumers can filter on it. Wrap a run in [`RunSpan`] to tag all of them
//! with the run id.

use tracing::{info, warn};

use crate::domain::RunPhase;

/// RAII guard that keeps a run-scoped span entered.
///
/// ```ignore
/// let _span = RunSpan::enter("3f2a...");
/// // every event below carries run_id = "3f2a..."
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        Self {
            _span: run_span(run_id).entered(),
        }
    }
}

/// The run-scoped span itself, for instrumenting futures.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("folio.run", run_id = %run_id)
}

/// The run moved to a new phase.
pub fn emit_phase_entered(phase: RunPhase) {
    info!(event = "run.phase", phase = %phase);
}

pub fn emit_module_started(module_id: &str, module_name: &str) {
    info!(event = "module.started", module_id = %module_id, module_name = %module_name);
}

/// A module finished; failures are logged at warn level with their error text.
pub fn emit_module_finished(module_id: &str, success: bool, pdf_count: usize, duration_ms: u64, error: &str) {
    if success {
        info!(
            event = "module.finished",
            module_id = %module_id,
            success = true,
            pdf_count = pdf_count,
            duration_ms = duration_ms,
        );
    } else {
        warn!(
            event = "module.finished",
            module_id = %module_id,
            success = false,
            duration_ms = duration_ms,
            error = %error,
        );
    }
}

pub fn emit_module_skipped(module_id: &str, reason: &str) {
    info!(event = "module.skipped", module_id = %module_id, reason = %reason);
}

pub fn emit_asset_fetched(resource_id: &str, kind: &str, byte_size: u64) {
    info!(
        event = "asset.fetched",
        resource_id = %resource_id,
        kind = %kind,
        byte_size = byte_size,
    );
}

pub fn emit_asset_cache_hit(resource_id: &str, kind: &str) {
    info!(event = "asset.cache_hit", resource_id = %resource_id, kind = %kind);
}

/// One merge strategy was tried; `outcome` is `merged`, `unavailable` or `failed`.
pub fn emit_merge_attempt(strategy: &str, outcome: &str, detail: &str) {
    if outcome == "merged" {
        info!(event = "assembly.strategy", strategy = %strategy, outcome = %outcome);
    } else {
        warn!(
            event = "assembly.strategy",
            strategy = %strategy,
            outcome = %outcome,
            detail = %detail,
        );
    }
}
