//! Domain types shared by the asset, build and CLI crates.

pub mod module;
pub mod phase;
pub mod result;

pub use module::{ModuleDescriptor, ModuleKind};
pub use phase::RunPhase;
pub use result::{
    ExecutionResult, FailureKind, SkippedModule, NOT_FOUND_EXIT_CODE, TIMEOUT_EXIT_CODE,
};
