use crate::process::{build_command, exit_code, run_captured, run_inherited};
use chrono::Utc;
use relock_core::{
    Invocation, ProcessResult, RelockError, Result, RunReport, RunStatus, RunnerConfig,
};
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Regenerates a lockfile by invoking the configured package manager once
#[derive(Clone, Debug)]
pub struct LockfileRunner {
    config: RunnerConfig,
}

impl LockfileRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Validate the project directory and build the invocation for it.
    /// Nothing is spawned here.
    pub async fn prepare(&self) -> Result<Invocation> {
        let dir = &self.config.project_dir;
        let metadata = tokio::fs::metadata(dir)
            .await
            .map_err(|source| RelockError::Directory {
                path: dir.clone(),
                source,
            })?;
        if !metadata.is_dir() {
            return Err(RelockError::NotADirectory(dir.clone()));
        }
        // Resolving `dir/.` needs search permission, same as entering it
        tokio::fs::metadata(dir.join("."))
            .await
            .map_err(|source| RelockError::Directory {
                path: dir.clone(),
                source,
            })?;

        Ok(self.config.invocation())
    }

    /// Prepare and execute in one call, capturing the child's output
    pub async fn run(&self) -> Result<RunReport> {
        let invocation = self.prepare().await?;
        self.execute(&invocation).await
    }

    /// Run `invocation` with captured output.
    ///
    /// A non-zero exit is reported in the returned `RunReport`, not raised.
    pub async fn execute(&self, invocation: &Invocation) -> Result<RunReport> {
        let id = Uuid::new_v4();
        let command = invocation.display_command();
        let started_at = Utc::now();
        let start_instant = std::time::Instant::now();

        info!(
            run_id = %id,
            command = %command,
            working_dir = %invocation.working_dir.display(),
            "Regenerating lockfile"
        );

        let cmd = build_command(invocation, &self.resolve_program(&invocation.program));
        let output = match run_captured(cmd, invocation.timeout, &command).await {
            Ok(output) => output,
            Err(e) => {
                error!(run_id = %id, error = %e, "Lockfile regeneration did not complete");
                return Err(e);
            }
        };

        let duration_ms = start_instant.elapsed().as_millis() as u64;
        let result = ProcessResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: exit_code(&output.status),
        };
        let status = RunStatus::from(&result);

        if status == RunStatus::Failed {
            warn!(
                run_id = %id,
                exit_code = result.exit_code,
                "Package manager exited with a non-zero code"
            );
        }
        info!(run_id = %id, status = ?status, duration_ms, "Lockfile regeneration completed");

        Ok(RunReport {
            id,
            mode: self.config.mode,
            command,
            working_dir: invocation.working_dir.clone(),
            result,
            status,
            duration_ms,
            started_at,
            completed_at: Utc::now(),
        })
    }

    /// Prepare and install in one call, streaming the child's output
    pub async fn run_full_install(&self) -> Result<()> {
        let invocation = self.prepare().await?;
        self.install(&invocation).await
    }

    /// Run `invocation` on the parent's stdio. Unlike `execute`, a non-zero
    /// exit is an error here.
    pub async fn install(&self, invocation: &Invocation) -> Result<()> {
        let command = invocation.display_command();
        info!(
            command = %command,
            working_dir = %invocation.working_dir.display(),
            "Running full install"
        );

        let cmd = build_command(invocation, &self.resolve_program(&invocation.program));
        let status = run_inherited(cmd, invocation.timeout, &command).await?;

        if !status.success() {
            let code = exit_code(&status);
            error!(command = %command, exit_code = code, "Full install failed");
            return Err(RelockError::CommandFailed { command, code });
        }

        info!(command = %command, "Full install completed");
        Ok(())
    }

    /// Look `program` up on PATH, falling back to the bare name so the
    /// spawn error is the one reported.
    fn resolve_program(&self, program: &str) -> PathBuf {
        match which::which(program) {
            Ok(path) => path,
            Err(e) => {
                warn!(program = %program, error = %e, "Program not found on PATH");
                PathBuf::from(program)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use relock_core::LockMode;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Project dir holding an `install` script, so `sh install ...` stands in
    /// for the package manager.
    fn project_with_install_script(script: &str) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("install"), script).unwrap();
        dir
    }

    fn runner_for(dir: &Path, timeout_secs: u64) -> LockfileRunner {
        LockfileRunner::new(RunnerConfig {
            project_dir: dir.to_path_buf(),
            program: "sh".to_string(),
            mode: LockMode::LockfileOnly,
            timeout_secs,
            fail_on_nonzero: false,
        })
    }

    #[tokio::test]
    async fn test_runner_success_reports_zero() {
        let project = project_with_install_script("echo \"locking $1\"\n");
        let report = runner_for(project.path(), 10).run().await.unwrap();

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.result.exit_code, 0);
        assert_eq!(report.result.stdout, "locking --package-lock-only\n");
        assert_eq!(report.result.stderr, "");
        assert_eq!(report.command, "sh install --package-lock-only");
        assert_eq!(report.mode, LockMode::LockfileOnly);
    }

    #[tokio::test]
    async fn test_runner_nonzero_exit_is_not_an_error() {
        let project = project_with_install_script("echo broken >&2\nexit 1\n");
        let report = runner_for(project.path(), 10).run().await.unwrap();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.result.exit_code, 1);
        assert_eq!(report.result.stderr, "broken\n");
    }

    #[tokio::test]
    async fn test_runner_runs_in_project_dir() {
        let project = project_with_install_script("touch package-lock.json\n");
        runner_for(project.path(), 10).run().await.unwrap();
        assert!(project.path().join("package-lock.json").exists());
    }

    #[tokio::test]
    async fn test_runner_invokes_exactly_once() {
        let project = project_with_install_script("echo call >> calls.log\nexit 1\n");
        runner_for(project.path(), 10).run().await.unwrap();

        let calls = fs::read_to_string(project.path().join("calls.log")).unwrap();
        assert_eq!(calls.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_runner_missing_directory() {
        let parent = tempfile::tempdir().unwrap();
        let missing = parent.path().join("no-such-project");
        let err = runner_for(&missing, 10).run().await.unwrap_err();

        assert!(matches!(err, RelockError::Directory { ref path, .. } if path == &missing));
    }

    #[tokio::test]
    async fn test_runner_path_is_a_file() {
        let parent = tempfile::tempdir().unwrap();
        let file = parent.path().join("package.json");
        fs::write(&file, "{}").unwrap();
        let err = runner_for(&file, 10).prepare().await.unwrap_err();

        assert!(matches!(err, RelockError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_runner_directory_without_search_permission() {
        use std::os::unix::fs::PermissionsExt;

        let parent = tempfile::tempdir().unwrap();
        let locked = parent.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("install"), "echo should not run\n").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users ignore the mode bits; nothing to check then
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = runner_for(&locked, 10).prepare().await;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let err = result.unwrap_err();
        assert!(matches!(err, RelockError::Directory { ref path, .. } if path == &locked));
    }

    #[tokio::test]
    async fn test_runner_times_out() {
        let project = project_with_install_script("sleep 5\n");
        let err = runner_for(project.path(), 1).run().await.unwrap_err();

        assert!(matches!(err, RelockError::Timeout { secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_runner_missing_program() {
        let project = tempfile::tempdir().unwrap();
        let runner = LockfileRunner::new(RunnerConfig {
            project_dir: project.path().to_path_buf(),
            program: "relock-definitely-not-installed".to_string(),
            ..RunnerConfig::default()
        });
        let err = runner.run().await.unwrap_err();

        assert!(matches!(err, RelockError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_full_install_success() {
        let project = project_with_install_script("touch node_modules.marker\n");
        let runner = LockfileRunner::new(RunnerConfig {
            mode: LockMode::FullInstall,
            ..runner_for(project.path(), 10).config().clone()
        });

        runner.run_full_install().await.unwrap();
        assert!(project.path().join("node_modules.marker").exists());
    }

    #[tokio::test]
    async fn test_full_install_failure_is_an_error() {
        let project = project_with_install_script("exit 4\n");
        let runner = LockfileRunner::new(RunnerConfig {
            mode: LockMode::FullInstall,
            ..runner_for(project.path(), 10).config().clone()
        });

        let err = runner.run_full_install().await.unwrap_err();
        assert!(matches!(err, RelockError::CommandFailed { code: 4, ref command } if command == "sh install"));
    }
}
