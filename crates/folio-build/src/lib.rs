//! Folio Build - runs notebook modules and assembles their output
//!
//! Provides the notebook pipeline that:
//! - Loads the module registry (configured and discovered modules)
//! - Prefetches external assets through the asset cache
//! - Executes each module in isolation with a timeout
//! - Orders the produced PDFs and merges them into one document

pub mod assembler;
pub mod error;
pub mod executor;
pub mod merge;
pub mod order;
pub mod pipeline;
pub mod prefetch;
pub mod registry;
pub mod summary;
pub mod task;

// Re-export key types
pub use assembler::{AssemblyOutcome, DocumentAssembler, MANIFEST_STRATEGY};
pub use error::BuildError;
pub use executor::{discover_pdfs, ExecutionReport, ModuleExecutor};
pub use merge::{GhostscriptMerger, LopdfMerger, MergeOutcome, MergeStrategy};
pub use order::{assembly_order, AssemblyRank, RankedPdf};
pub use pipeline::{NotebookPipeline, PipelineResult};
pub use prefetch::{prefetch_assets, PrefetchReport};
pub use registry::Registry;
pub use summary::{render_summary, RunReport};
pub use task::{InProcessExecutor, ProcessExecutor, Task, TaskExecutor, TaskOutput, TaskStatus};
