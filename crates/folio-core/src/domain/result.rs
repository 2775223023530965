//! Per-module execution outcomes.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Exit code reported for a module whose entry point does not exist.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

/// Exit code reported for a module killed by the timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Why a module produced no usable output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Entry point missing.
    NotFound,
    /// Still running when the timeout elapsed.
    Timeout,
    /// Exited with a non-zero code (or was killed by a signal).
    RuntimeFailure { exit_code: i32 },
    /// The process could not be started.
    SpawnFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NotFound => f.write_str("not found"),
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::RuntimeFailure { exit_code } => write!(f, "exit code {}", exit_code),
            FailureKind::SpawnFailed => f.write_str("spawn failed"),
        }
    }
}

/// Result of running one module entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub module_id: String,
    pub module_name: String,
    pub module_path: PathBuf,
    pub success: bool,
    /// Process exit code; `None` when killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    /// PDFs discovered in the module's `output` folder, in discovery order.
    pub pdf_files: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ExecutionResult {
    /// A failed result with the error text captured as stderr.
    pub fn failed(
        module_id: impl Into<String>,
        module_name: impl Into<String>,
        module_path: impl Into<PathBuf>,
        failure: FailureKind,
        stderr: impl Into<String>,
    ) -> Self {
        let exit_code = match &failure {
            FailureKind::NotFound => Some(NOT_FOUND_EXIT_CODE),
            FailureKind::Timeout => Some(TIMEOUT_EXIT_CODE),
            FailureKind::RuntimeFailure { exit_code } => Some(*exit_code),
            FailureKind::SpawnFailed => None,
        };
        Self {
            module_id: module_id.into(),
            module_name: module_name.into(),
            module_path: module_path.into(),
            success: false,
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 0,
            pdf_files: Vec::new(),
            failure: Some(failure),
        }
    }

    /// One-line error description for summaries; empty on success.
    pub fn error_text(&self) -> String {
        if self.success {
            return String::new();
        }
        let detail = self
            .stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(str::trim)
            .unwrap_or("");
        match (&self.failure, detail.is_empty()) {
            (Some(kind), true) => kind.to_string(),
            (Some(kind), false) => format!("{}: {}", kind, detail),
            (None, false) => detail.to_string(),
            (None, true) => "unknown error".to_string(),
        }
    }
}

/// A module that was deliberately not executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedModule {
    pub module_id: String,
    pub module_name: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_assigns_distinct_exit_codes() {
        let missing = ExecutionResult::failed("a", "A", "a", FailureKind::NotFound, "no main.py");
        let hung = ExecutionResult::failed("b", "B", "b", FailureKind::Timeout, "");
        assert_eq!(missing.exit_code, Some(NOT_FOUND_EXIT_CODE));
        assert_eq!(hung.exit_code, Some(TIMEOUT_EXIT_CODE));
        assert!(!missing.success && !hung.success);
    }

    #[test]
    fn error_text_uses_last_stderr_line() {
        let result = ExecutionResult::failed(
            "c",
            "C",
            "c",
            FailureKind::RuntimeFailure { exit_code: 2 },
            "Traceback\n  File main.py\nValueError: bad input\n\n",
        );
        assert_eq!(result.error_text(), "exit code 2: ValueError: bad input");
    }

    #[test]
    fn error_text_falls_back_to_failure_kind() {
        let result = ExecutionResult::failed("d", "D", "d", FailureKind::Timeout, "");
        assert_eq!(result.error_text(), "timeout");
    }

    #[test]
    fn failure_kind_serializes_tagged() {
        let json = serde_json::to_value(FailureKind::RuntimeFailure { exit_code: 3 }).unwrap();
        assert_eq!(json["kind"], "runtime_failure");
        assert_eq!(json["exit_code"], 3);
    }
}
