//! Built-in `system` backend: runs shell commands. Everything else is reported unsupported so
//! the engine can fall back or fail with a clear message.

use std::process::Stdio;

use async_trait::async_trait;
use deskrun_core::Method;
use deskrun_exec::executor::{ActionBackend, BackendError, BackendReply, StepRequest};
use tokio::process::Command;

const STDERR_LIMIT: usize = 200;

pub struct ShellBackend {
    shell: String,
}

impl ShellBackend {
    pub fn new() -> Self {
        Self {
            shell: std::env::var("DESKRUN_SHELL").unwrap_or_else(|_| "sh".to_string()),
        }
    }

    async fn run_command(&self, command: &str) -> Result<BackendReply, BackendError> {
        tracing::debug!(shell = %self.shell, command, "spawning command");
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BackendError::Failed(format!("failed to spawn {}: {e}", self.shell)))?;

        if output.status.success() {
            return Ok(BackendReply::Done(true));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr: String = stderr.trim().chars().take(STDERR_LIMIT).collect();
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        Err(BackendError::Failed(if stderr.is_empty() {
            format!("command failed: exit code {code}")
        } else {
            format!("command failed: exit code {code}: {stderr}")
        }))
    }
}

impl Default for ShellBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionBackend for ShellBackend {
    fn method(&self) -> Method {
        Method::System
    }

    async fn execute(&self, step: &StepRequest) -> Result<BackendReply, BackendError> {
        match step.action.as_str() {
            "run_command" if step.value.trim().is_empty() => {
                Err(BackendError::Failed("run_command needs a command".to_string()))
            }
            "run_command" => self.run_command(&step.value).await,
            other => Err(BackendError::Unavailable(format!(
                "'{other}' is not supported by the shell backend"
            ))),
        }
    }
}
