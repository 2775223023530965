//! Module Executor: runs module entry points and collects their PDFs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use folio_core::{
    emit_module_finished, emit_module_skipped, emit_module_started, ExecutionResult, FailureKind,
    FolioConfig, FolioError, ModuleDescriptor, SkippedModule, METRICS,
};
use futures::future::BoxFuture;
use regex::Regex;
use tracing::{debug, warn};

use crate::task::{Task, TaskExecutor, TaskStatus};

/// Folder inside each module where rendered PDFs are expected.
pub const OUTPUT_SUBDIR: &str = "output";

/// Results of a pass over the registry, in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    pub results: Vec<ExecutionResult>,
    pub skipped: Vec<SkippedModule>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

pub struct ModuleExecutor {
    runner: Arc<dyn TaskExecutor>,
    config: FolioConfig,
    root: PathBuf,
}

impl ModuleExecutor {
    pub fn new(runner: Arc<dyn TaskExecutor>, config: FolioConfig) -> Self {
        let root = fs::canonicalize(&config.root).unwrap_or_else(|_| config.root.clone());
        Self {
            runner,
            config,
            root,
        }
    }

    /// Run every module in order; containers recurse, inactive ones are skipped.
    pub async fn execute_all(&self, modules: &[ModuleDescriptor]) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        for module in modules {
            self.execute_tree(module, &mut report).await;
        }
        report
    }

    fn execute_tree<'a>(
        &'a self,
        module: &'a ModuleDescriptor,
        report: &'a mut ExecutionReport,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if !module.active {
                skip_tree(module, "inactive", report);
                return;
            }

            if module.is_container() && !self.has_entry(module) {
                debug!(module_id = %module.id, "Container has no entry point of its own");
            } else {
                let result = self.execute(module).await;
                report.results.push(result);
            }

            for child in &module.submodules {
                self.execute_tree(child, report).await;
            }
        })
    }

    /// Run one module's own entry point. Never fails; problems become a
    /// negative result.
    pub async fn execute(&self, module: &ModuleDescriptor) -> ExecutionResult {
        emit_module_started(&module.id, &module.name);

        let module_dir = module.dir(&self.root);
        let entry = module.entry_or(&self.config.default_entry);
        let entry_path = module_dir.join(entry);

        let result = if !entry_path.is_file() {
            let message = FolioError::ModuleNotFound {
                module_id: module.id.clone(),
                path: entry_path.clone(),
            };
            ExecutionResult::failed(
                &module.id,
                &module.name,
                &module.path,
                FailureKind::NotFound,
                message.to_string(),
            )
        } else {
            let task = self.build_task(module, &module_dir, &entry_path);
            self.run_task(module, &module_dir, &task).await
        };

        METRICS.record_module(result.success);
        emit_module_finished(
            &module.id,
            result.success,
            result.pdf_files.len(),
            result.duration_ms,
            &result.error_text(),
        );
        result
    }

    fn has_entry(&self, module: &ModuleDescriptor) -> bool {
        module
            .dir(&self.root)
            .join(module.entry_or(&self.config.default_entry))
            .is_file()
    }

    fn build_task(&self, module: &ModuleDescriptor, module_dir: &Path, entry_path: &Path) -> Task {
        let interpreter = module
            .interpreter
            .as_deref()
            .unwrap_or(&self.config.interpreter);

        let task = if interpreter.trim().is_empty() {
            Task::new(&module.id, entry_path.to_string_lossy())
        } else {
            let mut parts = interpreter.split_whitespace();
            let program = parts.next().unwrap_or(interpreter);
            let mut task = Task::new(&module.id, program);
            for part in parts {
                task = task.arg(part);
            }
            task.arg(module.entry_or(&self.config.default_entry))
        };

        let downloads = self.resolve(&self.config.downloads_dir);
        task.current_dir(module_dir)
            .timeout(self.config.module_timeout())
            .env("FOLIO_ROOT", self.root.to_string_lossy())
            .env("FOLIO_MODULE_ID", &module.id)
            .env("FOLIO_DOWNLOADS_DIR", downloads.to_string_lossy())
            .env("PYTHONPATH", python_path(&self.root))
    }

    async fn run_task(&self, module: &ModuleDescriptor, module_dir: &Path, task: &Task) -> ExecutionResult {
        let output = match self.runner.run(task).await {
            Ok(output) => output,
            Err(e) => {
                return ExecutionResult::failed(
                    &module.id,
                    &module.name,
                    &module.path,
                    FailureKind::SpawnFailed,
                    e.to_string(),
                );
            }
        };

        let (success, exit_code, failure) = match output.status {
            TaskStatus::Exited(0) => (true, Some(0), None),
            TaskStatus::Exited(code) => (
                false,
                Some(code),
                Some(FailureKind::RuntimeFailure { exit_code: code }),
            ),
            TaskStatus::Signaled => (
                false,
                None,
                Some(FailureKind::RuntimeFailure { exit_code: -1 }),
            ),
            TaskStatus::TimedOut => (
                false,
                Some(folio_core::domain::TIMEOUT_EXIT_CODE),
                Some(FailureKind::Timeout),
            ),
        };

        let mut stderr = output.stderr;
        let message = match failure {
            Some(FailureKind::Timeout) => Some(FolioError::ModuleTimeout {
                module_id: module.id.clone(),
                timeout_secs: self.config.module_timeout_secs,
            }),
            Some(FailureKind::RuntimeFailure { exit_code }) if stderr.trim().is_empty() => {
                Some(FolioError::ModuleRuntimeFailure {
                    module_id: module.id.clone(),
                    exit_code,
                })
            }
            _ => None,
        };
        if let Some(message) = message {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&message.to_string());
        }

        let pdf_files = if success {
            discover_pdfs(&module_dir.join(OUTPUT_SUBDIR), module.output_pattern.as_deref())
        } else {
            Vec::new()
        };

        ExecutionResult {
            module_id: module.id.clone(),
            module_name: module.name.clone(),
            module_path: module.path.clone(),
            success,
            exit_code,
            stdout: output.stdout,
            stderr,
            duration_ms: output.duration_ms,
            pdf_files,
            failure,
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn skip_tree(module: &ModuleDescriptor, reason: &str, report: &mut ExecutionReport) {
    emit_module_skipped(&module.id, reason);
    report.skipped.push(SkippedModule {
        module_id: module.id.clone(),
        module_name: module.name.clone(),
        reason: reason.to_string(),
    });
    for child in &module.submodules {
        skip_tree(child, "parent inactive", report);
    }
}

fn python_path(root: &Path) -> String {
    let mut paths = vec![root.to_path_buf()];
    if let Some(existing) = std::env::var_os("PYTHONPATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    match std::env::join_paths(paths) {
        Ok(joined) => joined.to_string_lossy().to_string(),
        Err(_) => root.to_string_lossy().to_string(),
    }
}

/// PDFs in `output_dir`, newest per name group, groups in name order.
///
/// A group is the file stem with trailing timestamp-like segments
/// (`_20240131`, `-120000`, four digits or more) removed, so reruns that
/// leave stale copies contribute one file. `pattern` is a `*` wildcard on
/// the whole file name.
pub fn discover_pdfs(output_dir: &Path, pattern: Option<&str>) -> Vec<PathBuf> {
    let entries = match fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %output_dir.display(), error = %e, "No output folder");
            return Vec::new();
        }
    };

    let matcher = match pattern.map(wildcard_regex).transpose() {
        Ok(m) => m,
        Err(e) => {
            warn!(pattern = ?pattern, error = %e, "Invalid output pattern, collecting nothing");
            return Vec::new();
        }
    };

    let mut files: Vec<(String, PathBuf, SystemTime)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            let is_pdf = Path::new(&name)
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if !is_pdf {
                return None;
            }
            if let Some(re) = &matcher {
                if !re.is_match(&name) {
                    return None;
                }
            }
            let modified = e
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Some((name, e.path(), modified))
        })
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut order: Vec<String> = Vec::new();
    let mut newest: HashMap<String, (PathBuf, SystemTime)> = HashMap::new();
    for (name, path, modified) in files {
        let key = group_key(&name);
        match newest.get(&key) {
            None => {
                order.push(key.clone());
                newest.insert(key, (path, modified));
            }
            Some((_, seen)) if modified >= *seen => {
                newest.insert(key, (path, modified));
            }
            Some(_) => {}
        }
    }

    order
        .into_iter()
        .filter_map(|key| newest.remove(&key).map(|(path, _)| path))
        .collect()
}

fn group_key(file_name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"([_\-]\d{4,})+$").expect("valid regex"));
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let trimmed = re.replace(stem, "");
    if trimmed.is_empty() {
        stem.to_string()
    } else {
        trimmed.to_string()
    }
}

fn wildcard_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    Regex::new(&format!("^{}$", escaped.join(".*")))
}
