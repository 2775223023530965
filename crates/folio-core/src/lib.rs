//! Folio Core Library
//!
//! Shared domain types, settings, error taxonomy and observability hooks
//! used by the asset, build and CLI crates.

pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod obs;
pub mod telemetry;

pub use config::FolioConfig;
pub use domain::{
    ExecutionResult, FailureKind, ModuleDescriptor, ModuleKind, RunPhase, SkippedModule,
};
pub use error::{FolioError, Result};
pub use metrics::METRICS;
pub use obs::{
    emit_asset_cache_hit, emit_asset_fetched, emit_merge_attempt, emit_module_finished,
    emit_module_skipped, emit_module_started, emit_phase_entered, run_span, RunSpan,
};
pub use telemetry::{init_tracing, LogFormat};

/// Folio version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
