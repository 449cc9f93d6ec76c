//! Command executors for the external release steps.

use crate::config::CommandSpec;
use async_trait::async_trait;
use relpack_common::{Error, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// Captured result of an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Trait for command execution.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a command in `cwd` and capture its output.
    async fn execute(&self, command: &CommandSpec, cwd: &Path) -> Result<CommandOutput>;
}

/// Executor spawning local processes.
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, command: &CommandSpec, cwd: &Path) -> Result<CommandOutput> {
        let program = which::which_in(&command.program, std::env::var_os("PATH"), cwd)
            .map_err(|_| Error::MissingTool(command.program.clone()))?;
        debug!("Local exec: {} (in {})", command.display(), cwd.display());

        let output = Command::new(&program)
            .args(&command.args)
            .envs(&command.env)
            .current_dir(cwd)
            .output()
            .await?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Run one release step; any non-zero exit aborts the build.
pub async fn run_step(
    executor: &dyn Executor,
    step: &str,
    command: &CommandSpec,
    cwd: &Path,
) -> Result<()> {
    info!("Running {} step: {}", step, command.display());
    let output = executor.execute(command, cwd).await?;

    if !output.success() {
        return Err(Error::ExternalCollaborator {
            step: step.to_string(),
            program: command.program.clone(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }

    debug!(step, stdout = %output.stdout.trim(), "Step finished");
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_local_executor_captures_output() {
        let dir = tempdir().unwrap();
        let output = LocalExecutor::new()
            .execute(&sh("echo out; echo err >&2; exit 3"), dir.path())
            .await
            .unwrap();

        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory_with_env() {
        let dir = tempdir().unwrap();
        let mut command = sh("printf %s \"$RELEASE_MODE\" > mode.txt");
        command
            .env
            .insert("RELEASE_MODE".to_string(), "prod".to_string());

        run_step(&LocalExecutor::new(), "install", &command, dir.path())
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("mode.txt")).unwrap(),
            "prod"
        );
    }

    #[tokio::test]
    async fn test_failed_step_is_fatal() {
        let dir = tempdir().unwrap();
        let err = run_step(&LocalExecutor::new(), "install", &sh("echo boom >&2; exit 1"), dir.path())
            .await
            .unwrap_err();

        match err {
            Error::ExternalCollaborator {
                step,
                status,
                stderr,
                ..
            } => {
                assert_eq!(step, "install");
                assert_eq!(status, Some(1));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempdir().unwrap();
        let err = LocalExecutor::new()
            .execute(&CommandSpec::new("relpack-no-such-tool"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingTool(_)));
    }
}
