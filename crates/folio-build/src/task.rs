//! Task execution seam.
//!
//! A [`Task`] is one program invocation with a working directory, extra
//! environment and a deadline. [`ProcessExecutor`] runs it as a child
//! process; [`InProcessExecutor`] dispatches to registered closures so the
//! pipeline can be driven without spawning anything.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{BuildError, Result};

/// One program invocation.
#[derive(Debug, Clone)]
pub struct Task {
    /// Label used in logs and for in-process dispatch.
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl Task {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            env: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Exited(i32),
    /// Terminated by a signal, no exit code.
    Signaled,
    /// Deadline elapsed; the task was abandoned (and killed, for processes).
    TimedOut,
}

impl TaskStatus {
    pub fn success(&self) -> bool {
        matches!(self, TaskStatus::Exited(0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub status: TaskStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl TaskOutput {
    pub fn exited(code: i32) -> Self {
        Self {
            status: TaskStatus::Exited(code),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }
}

/// Runs tasks. `Err` means the task never started.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn run(&self, task: &Task) -> Result<TaskOutput>;
}

/// Spawns each task as a child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

#[async_trait]
impl TaskExecutor for ProcessExecutor {
    async fn run(&self, task: &Task) -> Result<TaskOutput> {
        if task.program.is_empty() {
            return Err(BuildError::EmptyCommand(task.name.clone()));
        }
        let start = Instant::now();

        let mut child = Command::new(&task.program)
            .args(&task.args)
            .current_dir(&task.working_dir)
            .envs(task.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildError::Spawn {
                program: task.program.clone(),
                reason: e.to_string(),
            })?;

        // Pipes are drained while the child runs so a hung task still
        // reports what it printed before the deadline.
        let stdout = Capture::start(child.stdout.take());
        let stderr = Capture::start(child.stderr.take());

        let status = match tokio::time::timeout(task.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                debug!(task = %task.name, timeout_secs = task.timeout.as_secs(), "Task timed out");
                if let Err(e) = child.kill().await {
                    debug!(task = %task.name, error = %e, "Kill after timeout failed");
                }
                return Ok(TaskOutput {
                    status: TaskStatus::TimedOut,
                    stdout: stdout.collect(Some(DRAIN_GRACE)).await,
                    stderr: stderr.collect(Some(DRAIN_GRACE)).await,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
        };

        let status = match status.code() {
            Some(code) => TaskStatus::Exited(code),
            None => TaskStatus::Signaled,
        };

        Ok(TaskOutput {
            status,
            stdout: stdout.collect(None).await,
            stderr: stderr.collect(None).await,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// How long a killed task's pipes may keep draining.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Background reader that accumulates one child pipe.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl Capture {
    fn start<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let reader = pipe.map(|mut pipe| {
            let sink = buf.clone();
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if let Ok(mut out) = sink.lock() {
                                out.extend_from_slice(&chunk[..n]);
                            }
                        }
                    }
                }
            })
        });
        Self { buf, reader }
    }

    /// Wait for the pipe to close, or at most `grace`, and return the text
    /// read so far. A grandchild can hold the pipe open after a kill.
    async fn collect(self, grace: Option<Duration>) -> String {
        if let Some(mut reader) = self.reader {
            match grace {
                None => {
                    let _ = (&mut reader).await;
                }
                Some(grace) => {
                    if tokio::time::timeout(grace, &mut reader).await.is_err() {
                        reader.abort();
                    }
                }
            }
        }
        let bytes = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

type Handler = Arc<dyn Fn(&Task) -> TaskOutput + Send + Sync>;

/// Dispatches tasks by name to registered closures.
///
/// Handlers run on the blocking pool under the task's deadline. A handler
/// that overruns is reported as `TimedOut`; its thread is left to finish.
#[derive(Default, Clone)]
pub struct InProcessExecutor {
    handlers: HashMap<String, Handler>,
}

impl InProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Task) -> TaskOutput + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }
}

#[async_trait]
impl TaskExecutor for InProcessExecutor {
    async fn run(&self, task: &Task) -> Result<TaskOutput> {
        let handler = self
            .handlers
            .get(&task.name)
            .cloned()
            .ok_or_else(|| BuildError::Spawn {
                program: task.program.clone(),
                reason: format!("no in-process handler for {}", task.name),
            })?;

        let start = Instant::now();
        let owned = task.clone();
        let job = tokio::task::spawn_blocking(move || handler(&owned));

        match tokio::time::timeout(task.timeout, job).await {
            Ok(Ok(mut output)) => {
                output.duration_ms = start.elapsed().as_millis() as u64;
                Ok(output)
            }
            Ok(Err(join)) => Ok(TaskOutput {
                status: TaskStatus::Signaled,
                stdout: String::new(),
                stderr: format!("handler panicked: {}", join),
                duration_ms: start.elapsed().as_millis() as u64,
            }),
            Err(_) => Ok(TaskOutput {
                status: TaskStatus::TimedOut,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn process_captures_stdout_and_exit_code() {
        let task = Task::new("echo", "sh").arg("-c").arg("echo hello; exit 3");
        let output = ProcessExecutor.run(&task).await.unwrap();
        assert_eq!(output.status, TaskStatus::Exited(3));
        assert!(output.stdout.contains("hello"));
        assert!(!output.status.success());
    }

    #[tokio::test]
    async fn process_runs_in_working_dir_with_env() {
        let dir = tempfile::tempdir().unwrap();
        let task = Task::new("env", "sh")
            .arg("-c")
            .arg("pwd; echo $FOLIO_MODULE_ID")
            .current_dir(dir.path())
            .env("FOLIO_MODULE_ID", "01.00");
        let output = ProcessExecutor.run(&task).await.unwrap();
        assert!(output.status.success());
        let canonical = std::fs::canonicalize(dir.path()).unwrap();
        assert!(output.stdout.contains(canonical.to_str().unwrap()));
        assert!(output.stdout.contains("01.00"));
    }

    #[tokio::test]
    async fn process_timeout_is_distinct_from_failure() {
        let task = Task::new("sleepy", "sleep")
            .arg("5")
            .timeout(Duration::from_millis(200));
        let output = ProcessExecutor.run(&task).await.unwrap();
        assert_eq!(output.status, TaskStatus::TimedOut);
        assert!(output.duration_ms < 5000);
    }

    #[tokio::test]
    async fn process_timeout_keeps_output_written_before_hang() {
        let task = Task::new("hung", "sh")
            .arg("-c")
            .arg("echo 'loading sheet 3' >&2; echo started; sleep 5")
            .timeout(Duration::from_millis(500));
        let started = Instant::now();
        let output = ProcessExecutor.run(&task).await.unwrap();

        assert_eq!(output.status, TaskStatus::TimedOut);
        assert!(output.stderr.contains("loading sheet 3"));
        assert!(output.stdout.contains("started"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let task = Task::new("ghost", "folio-definitely-not-a-program");
        assert!(matches!(
            ProcessExecutor.run(&task).await,
            Err(BuildError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn in_process_dispatches_by_name() {
        let executor = InProcessExecutor::new()
            .register("ok", |_| TaskOutput::exited(0).with_stdout("rendered"))
            .register("bad", |_| TaskOutput::exited(2).with_stderr("Traceback"));

        let ok = executor.run(&Task::new("ok", "python3")).await.unwrap();
        assert!(ok.status.success());
        assert_eq!(ok.stdout, "rendered");

        let bad = executor.run(&Task::new("bad", "python3")).await.unwrap();
        assert_eq!(bad.status, TaskStatus::Exited(2));

        assert!(executor.run(&Task::new("unknown", "python3")).await.is_err());
    }

    #[tokio::test]
    async fn in_process_honours_deadline() {
        let executor = InProcessExecutor::new().register("hang", |_| {
            std::thread::sleep(Duration::from_millis(500));
            TaskOutput::exited(0)
        });
        let task = Task::new("hang", "python3").timeout(Duration::from_millis(50));
        let output = executor.run(&task).await.unwrap();
        assert_eq!(output.status, TaskStatus::TimedOut);
    }
}
