use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::GitError;

/// Abstraction over git CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
pub trait GitExecutor {
    /// Execute a git command in `dir` with extra environment variables and
    /// capture stdout.
    fn exec(
        &self,
        dir: &Path,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<Vec<u8>, GitError>;
}

/// Real git CLI executor.
#[derive(Debug, Clone)]
pub struct RealExecutor {
    program: String,
}

impl RealExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for RealExecutor {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitExecutor for RealExecutor {
    fn exec(
        &self,
        dir: &Path,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<Vec<u8>, GitError> {
        tracing::debug!(?args, dir = %dir.display(), "running git");

        let output = Command::new(&self.program)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| GitError::NotFound {
                program: self.program.clone(),
                source: e,
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(GitError::CommandFailed {
                args: args.to_vec(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}
