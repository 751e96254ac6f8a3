//! External lock generator invocation.
//!
//! The generator's real output channel is `<workspace>/docker-lock.json`; the
//! captured stdout it returns is diagnostic text only.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use lockbot_core::{GeneratorConfig, RepositoryIdentity, LOCK_FILE_NAME};

use crate::error::GeneratorError;

/// Arguments for one generator run.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub repository: &'a RepositoryIdentity,
    /// Installation token; empty when the credential step failed.
    pub token: &'a str,
    pub workspace: &'a Path,
}

#[async_trait]
pub trait LockGenerator: Send + Sync {
    /// Produce `<workspace>/docker-lock.json` and return captured stdout.
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, GeneratorError>;
}

/// Runs `<program> [args…] <repoName> <ownerName> <token> <workspacePath>`.
#[derive(Debug, Clone)]
pub struct CommandLockGenerator {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLockGenerator {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

#[async_trait]
impl LockGenerator for CommandLockGenerator {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, GeneratorError> {
        // The token is a positional argument; never log the full command line.
        tracing::debug!(
            program = %self.program.display(),
            repository = %request.repository,
            workspace = %request.workspace.display(),
            "running lock generator",
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&request.repository.name)
            .arg(&request.repository.owner)
            .arg(request.token)
            .arg(request.workspace)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| GeneratorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(GeneratorError::Exit {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let lock_path = request.workspace.join(LOCK_FILE_NAME);
        if !tokio::fs::try_exists(&lock_path).await.unwrap_or(false) {
            return Err(GeneratorError::MissingOutput { path: lock_path });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// `sh -c <script> sh repo owner token workspace` exposes the positional
    /// arguments as `$1..$4`.
    fn shell(script: &str) -> CommandLockGenerator {
        CommandLockGenerator::new("sh", vec!["-c".into(), script.into(), "sh".into()])
    }

    fn repo() -> RepositoryIdentity {
        RepositoryIdentity::new("acme", "widgets")
    }

    #[tokio::test]
    async fn passes_positional_arguments_and_captures_stdout() {
        let ws = TempDir::new().unwrap();
        let generator = shell(r#"printf '{"repo":"%s","owner":"%s"}' "$1" "$2" > "$4/docker-lock.json"; echo "token=$3""#);

        let stdout = generator
            .generate(GenerateRequest {
                repository: &repo(),
                token: "ghs_abc",
                workspace: ws.path(),
            })
            .await
            .expect("generate");

        assert_eq!(stdout.trim(), "token=ghs_abc");
        let written = std::fs::read_to_string(ws.path().join("docker-lock.json")).unwrap();
        assert_eq!(written, r#"{"repo":"widgets","owner":"acme"}"#);
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let ws = TempDir::new().unwrap();
        let err = shell("echo 'registry unreachable' >&2; exit 3")
            .generate(GenerateRequest {
                repository: &repo(),
                token: "",
                workspace: ws.path(),
            })
            .await
            .unwrap_err();

        match err {
            GeneratorError::Exit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "registry unreachable");
            }
            other => panic!("expected exit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_without_output_file_is_an_error() {
        let ws = TempDir::new().unwrap();
        let err = shell("echo done")
            .generate(GenerateRequest {
                repository: &repo(),
                token: "",
                workspace: ws.path(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::MissingOutput { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let ws = TempDir::new().unwrap();
        let err = CommandLockGenerator::new("/nonexistent/lockbot-generator", vec![])
            .generate(GenerateRequest {
                repository: &repo(),
                token: "",
                workspace: ws.path(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Spawn { .. }), "got {err:?}");
    }
}
