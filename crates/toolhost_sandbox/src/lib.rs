//! Sandbox executor: every submitted script runs in a fresh,
//! short-lived subprocess of the configured script runtime with
//! network-only capability and a hard 10 second wall clock.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use toolhost_ids::{RunId, SessionId};
use toolhost_runlog::{RunLog, ScriptRunRecord};

/// Hard wall-clock limit for one script run.
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(10);

/// How to invoke the script runtime. Network-only capability and
/// import-from-origin permission are flags the runtime itself
/// understands; this crate only shells out to it and supervises the
/// wall clock.
#[derive(Clone)]
pub struct SandboxCommand {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to write sandbox source file: {0}")]
    TempFile(#[from] std::io::Error),
    #[error("failed to spawn sandbox subprocess: {0}")]
    Spawn(String),
}

#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    pub success: bool,
    pub output: String,
    /// Captured stderr from a run that nonetheless exited successfully.
    pub warnings: Option<String>,
    /// Why the run failed; holds the captured stderr when there was any.
    pub error: Option<String>,
    pub duration_ms: u64,
}

pub struct SandboxExecutor {
    command: SandboxCommand,
    run_log: std::sync::Arc<RunLog>,
}

impl SandboxExecutor {
    pub fn new(command: SandboxCommand, run_log: std::sync::Arc<RunLog>) -> Self {
        Self { command, run_log }
    }

    /// Runs `script` with `tools` pre-bound from `client_module_url`
    /// (already including its cache-busting version query string).
    /// `stdin` is piped through verbatim when present, matching a script
    /// that expects input data.
    pub async fn execute(
        &self,
        script: &str,
        client_module_url: &str,
        session_id: Option<SessionId>,
        stdin: Option<&str>,
    ) -> Result<SandboxOutcome, SandboxError> {
        let source = format!(
            "import {{ tools }} from \"{client_module_url}\";\n\n{script}\n"
        );

        let mut temp_file = tempfile::Builder::new()
            .prefix("toolhost-run-")
            .suffix(".ts")
            .tempfile()?;
        temp_file.write_all(source.as_bytes())?;
        let temp_path: PathBuf = temp_file.path().to_path_buf();

        toolhost_protocol::METRICS.inc_sandbox_runs();
        let start = Instant::now();
        let outcome = self.run_subprocess(&temp_path, stdin).await;

        // The temp file must always be unlinked, regardless of outcome.
        drop(temp_file);
        let _ = std::fs::remove_file(&temp_path);

        let outcome = outcome.unwrap_or_else(|e| SandboxOutcome {
            success: false,
            output: String::new(),
            warnings: None,
            error: Some(e.to_string()),
            duration_ms: start.elapsed().as_millis() as u64,
        });

        let record = ScriptRunRecord {
            id: RunId::new(),
            started_at: Utc::now(),
            script: script.to_string(),
            success: outcome.success,
            output: outcome.output.clone(),
            error: outcome.error.clone().or_else(|| outcome.warnings.clone()),
            duration_ms: outcome.duration_ms,
            session_id,
        };
        // Fire-and-forget: the caller's reply must not wait on history.
        let run_log = std::sync::Arc::clone(&self.run_log);
        tokio::spawn(async move {
            run_log.append(&record).await;
        });

        Ok(outcome)
    }

    async fn run_subprocess(
        &self,
        source_path: &PathBuf,
        stdin: Option<&str>,
    ) -> Result<SandboxOutcome, SandboxError> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .arg(source_path)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| SandboxError::Spawn(e.to_string()))?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                let _ = pipe.write_all(input.as_bytes()).await;
            }
        }

        let start = Instant::now();
        let wait = child.wait_with_output();

        match timeout(SCRIPT_TIMEOUT, wait).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let stderr = (!stderr.is_empty()).then_some(stderr);
                let success = output.status.success();
                Ok(SandboxOutcome {
                    success,
                    output: stdout,
                    warnings: if success { stderr.clone() } else { None },
                    error: if success {
                        None
                    } else {
                        Some(stderr.unwrap_or_else(|| "script execution failed".to_string()))
                    },
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Ok(SandboxOutcome {
                success: false,
                output: String::new(),
                warnings: None,
                error: Some(e.to_string()),
                duration_ms: start.elapsed().as_millis() as u64,
            }),
            Err(_) => {
                toolhost_protocol::METRICS.inc_sandbox_timeouts();
                tracing::warn!("script exceeded the 10s wall clock; killing the sandbox");
                Ok(SandboxOutcome {
                    success: false,
                    output: String::new(),
                    warnings: None,
                    error: Some("Script execution timeout (10 seconds)".to_string()),
                    duration_ms: SCRIPT_TIMEOUT.as_millis() as u64,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_log() -> std::sync::Arc<RunLog> {
        let dir = tempfile::tempdir().unwrap();
        std::sync::Arc::new(RunLog::new(dir.path().join("log.jsonl")))
    }

    #[tokio::test]
    async fn successful_script_reports_stdout() {
        let executor = SandboxExecutor::new(
            SandboxCommand {
                program: "/bin/sh".into(),
                args: vec!["-c".into(), "echo hello".into()],
            },
            run_log(),
        );
        let outcome = executor
            .execute("ignored", "file:///client.ts", None, None)
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.output.contains("hello"));
        assert!(outcome.warnings.is_none());
    }

    #[tokio::test]
    async fn stderr_from_a_successful_run_lands_in_warnings_not_error() {
        let executor = SandboxExecutor::new(
            SandboxCommand {
                program: "/bin/sh".into(),
                args: vec!["-c".into(), "echo ok; echo careful 1>&2".into()],
            },
            run_log(),
        );
        let outcome = executor
            .execute("ignored", "file:///client.ts", None, None)
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.output.contains("ok"));
        assert_eq!(outcome.warnings.as_deref(), Some("careful\n"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_as_failure() {
        let executor = SandboxExecutor::new(
            SandboxCommand {
                program: "/bin/sh".into(),
                args: vec!["-c".into(), "echo boom 1>&2; exit 1".into()],
            },
            run_log(),
        );
        let outcome = executor
            .execute("ignored", "file:///client.ts", None, None)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("boom\n"));
    }

    #[tokio::test]
    async fn hung_script_times_out_at_ten_seconds() {
        let executor = SandboxExecutor::new(
            SandboxCommand {
                program: "/bin/sh".into(),
                args: vec!["-c".into(), "sleep 30".into()],
            },
            run_log(),
        );
        let start = Instant::now();
        let outcome = executor
            .execute("ignored", "file:///client.ts", None, None)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Script execution timeout (10 seconds)")
        );
        assert!(start.elapsed() < Duration::from_secs(15));
    }
}
