use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// How the package manager is asked to regenerate the lockfile
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Rewrite the lockfile without touching the installed dependency tree
    #[default]
    LockfileOnly,
    /// Plain install; regenerates the lockfile and installs dependencies
    FullInstall,
}

impl LockMode {
    pub fn args(&self) -> Vec<String> {
        match self {
            LockMode::LockfileOnly => vec!["install".to_string(), "--package-lock-only".to_string()],
            LockMode::FullInstall => vec!["install".to_string()],
        }
    }
}

/// A single subprocess invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.into(),
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `program arg1 arg2 ...`, as shown to the user
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a completed child process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

impl From<&ProcessResult> for RunStatus {
    fn from(result: &ProcessResult) -> Self {
        if result.success() {
            RunStatus::Success
        } else {
            RunStatus::Failed
        }
    }
}

/// Record of one lockfile regeneration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub id: Uuid,
    pub mode: LockMode,
    pub command: String,
    pub working_dir: PathBuf,
    pub result: ProcessResult,
    pub status: RunStatus,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
