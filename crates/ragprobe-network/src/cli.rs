//! Subprocess backend that shells out to a model runner such as `ollama`.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use ragprobe_core::{EvalError, Generator};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs `<executable> generate <model> <prompt>` and captures stdout.
pub struct CliBackend {
    executable: String,
    model: String,
    timeout: Duration,
}

impl CliBackend {
    /// Creates a backend for the given executable and model.
    pub fn new(executable: &str, model: &str, timeout: Duration) -> Self {
        Self {
            executable: executable.to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    /// Checks that the executable can be started at all.
    pub async fn check_available(&self) -> bool {
        let status = Command::new(&self.executable)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(s) if s.success() => true,
            Ok(s) => {
                warn!("{} --version exited with {}", self.executable, s);
                false
            }
            Err(e) => {
                warn!("{} is not available: {}", self.executable, e);
                false
            }
        }
    }

    async fn run(&self, prompt: &str) -> Result<String, EvalError> {
        debug!("Running {} generate {}", self.executable, self.model);

        let child = Command::new(&self.executable)
            .arg("generate")
            .arg(&self.model)
            .arg(prompt)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| EvalError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => EvalError::Backend(format!("{} not found on PATH", self.executable)),
                _ => EvalError::Backend(format!("failed to start {}: {}", self.executable, e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EvalError::Backend(format!(
                "{} generate exited with {}: {}",
                self.executable, output.status, stderr
            )));
        }

        let answer = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("{}: {} chars generated", self.model, answer.len());
        Ok(answer)
    }
}

#[async_trait]
impl Generator for CliBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, EvalError> {
        self.run(prompt).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Instant;

    use pretty_assertions::assert_eq;

    use super::*;

    fn backend(executable: &str) -> CliBackend {
        CliBackend::new(executable, "llama3", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn passes_generate_model_and_prompt() {
        let answer = backend("echo").generate("What is Giskard?").await.unwrap();
        assert_eq!(answer, "generate llama3 What is Giskard?");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let err = backend("false").generate("hi").await.unwrap_err();
        assert!(matches!(err, EvalError::Backend(msg) if msg.contains("exited")));
    }

    #[tokio::test]
    async fn missing_executable_is_reported() {
        let missing = backend("ragprobe-no-such-binary");
        assert!(!missing.check_available().await);

        let err = missing.generate("hi").await.unwrap_err();
        assert!(matches!(err, EvalError::Backend(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn slow_runner_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-runner");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let slow = CliBackend::new(script.to_str().unwrap(), "llama3", Duration::from_secs(1));
        let started = Instant::now();
        let err = slow.generate("hi").await.unwrap_err();

        assert!(matches!(err, EvalError::Timeout(1)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
