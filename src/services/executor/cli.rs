//! Model CLI executor.
//!
//! Spawns the model CLI in `--print --output-format stream-json` mode, writes
//! the prompt to stdin and decodes stdout line by line. The child is killed
//! when the returned stream is dropped.

use async_trait::async_trait;
use futures_util::{Stream, stream};
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info, warn};

use crate::config::config::ExecutorConfig;
use crate::error::{AppError, Result};
use crate::models::stream::{RawEvent, RawEventStream, StreamFailure};
use crate::services::executor::{ExecutionRequest, ModelExecutor};

/// Keep at most this much stderr for error reports.
const STDERR_TAIL: usize = 4096;

/// Stdout lines; an idle timeout surfaces as `ErrorKind::TimedOut`.
type TimedLines = Pin<Box<dyn Stream<Item = std::io::Result<String>> + Send>>;

/// Runs the model CLI as a child process.
pub struct CliExecutor {
    cli_path: PathBuf,
    cwd: Option<PathBuf>,
    idle_timeout: Duration,
}

impl CliExecutor {
    pub fn new(cli_path: PathBuf, cwd: Option<PathBuf>, idle_timeout: Duration) -> Self {
        Self {
            cli_path,
            cwd,
            idle_timeout,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            config.cli_path.clone(),
            config.cwd.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Command-line arguments for a run. The prompt goes to stdin.
    pub fn build_args(request: &ExecutionRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--print".into(),
            "--output-format".into(),
            "stream-json".into(),
            "--verbose".into(),
            "--max-turns".into(),
            request.max_turns.to_string(),
        ];

        if let Some(model) = &request.model {
            args.push("--model".into());
            args.push(model.clone());
        }
        if let Some(system_prompt) = &request.system_prompt {
            args.push("--system-prompt".into());
            args.push(system_prompt.clone());
        }
        if let Some(tools) = request.allowed_tools.as_ref().filter(|t| !t.is_empty()) {
            args.push("--allowedTools".into());
            args.push(tools.join(","));
        }
        if let Some(tools) = request.disallowed_tools.as_ref().filter(|t| !t.is_empty()) {
            args.push("--disallowedTools".into());
            args.push(tools.join(","));
        }
        if let Some(mode) = request.permission_mode {
            args.push("--permission-mode".into());
            args.push(mode.to_string());
        }

        args
    }

    fn spawn(&self, request: &ExecutionRequest) -> Result<Child> {
        let mut command = Command::new(&self.cli_path);
        command
            .args(Self::build_args(request))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        if let Some(tokens) = request.max_thinking_tokens {
            command.env("MAX_THINKING_TOKENS", tokens.to_string());
        }

        command.spawn().map_err(|e| {
            AppError::Upstream(format!(
                "failed to start {}: {}",
                self.cli_path.display(),
                e
            ))
        })
    }
}

/// State of one running CLI invocation.
struct CliRun {
    lines: TimedLines,
    child: Child,
    stderr: Option<JoinHandle<String>>,
    idle_timeout: Duration,
    finished: bool,
}

impl CliRun {
    async fn next_event(&mut self) -> Option<std::result::Result<RawEvent, StreamFailure>> {
        while !self.finished {
            match self.lines.next().await {
                Some(Ok(line)) => match RawEvent::from_line(&line) {
                    Some(event) => return Some(Ok(event)),
                    None => {
                        if !line.trim().is_empty() {
                            debug!(line = %line, "skipping undecodable line from model process");
                        }
                    }
                },
                Some(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => {
                    self.finished = true;
                    warn!(idle_ms = self.idle_timeout.as_millis() as u64, "model process idle timeout");
                    return Some(Err(StreamFailure::Timeout(self.idle_timeout)));
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(StreamFailure::Upstream(format!(
                        "failed to read model output: {}",
                        e
                    ))));
                }
                None => {
                    self.finished = true;
                    return self.exit_failure().await.map(Err);
                }
            }
        }
        None
    }

    /// After stdout closes: a non-zero exit becomes an upstream failure.
    async fn exit_failure(&mut self) -> Option<StreamFailure> {
        let status = match self.child.wait().await {
            Ok(status) => status,
            Err(e) => return Some(StreamFailure::Upstream(format!("failed to wait for model process: {}", e))),
        };
        if status.success() {
            debug!("model process exited cleanly");
            return None;
        }

        let stderr = match self.stderr.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        let detail = stderr.trim();
        Some(StreamFailure::Upstream(if detail.is_empty() {
            format!("model process exited with {}", status)
        } else {
            format!("model process exited with {}: {}", status, detail)
        }))
    }
}

async fn read_stderr<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        debug!(error = %e, "failed to read model stderr");
    }
    let start = buf.len().saturating_sub(STDERR_TAIL);
    String::from_utf8_lossy(&buf[start..]).into_owned()
}

#[async_trait]
impl ModelExecutor for CliExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<RawEventStream> {
        let mut child = self.spawn(&request)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Upstream("failed to capture model stdout".into()))?;
        let stderr = child.stderr.take().map(|err| tokio::spawn(read_stderr(err)));

        if let Some(mut stdin) = child.stdin.take() {
            let prompt = request.prompt.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    warn!(error = %e, "failed to write prompt to model process");
                }
            });
        }

        info!(
            cli = %self.cli_path.display(),
            model = request.model.as_deref().unwrap_or("default"),
            max_turns = request.max_turns,
            prompt_chars = request.prompt.chars().count(),
            "model process started"
        );

        let lines = LinesStream::new(BufReader::new(stdout).lines())
            .timeout(self.idle_timeout)
            .map(|item| item.unwrap_or_else(|_| Err(std::io::ErrorKind::TimedOut.into())));
        let run = CliRun {
            lines: Box::pin(lines),
            child,
            stderr,
            idle_timeout: self.idle_timeout,
            finished: false,
        };

        let events = stream::unfold(run, |mut run| async move {
            let event = run.next_event().await?;
            Some((event, run))
        });
        Ok(Box::pin(events))
    }

    async fn verify(&self) -> bool {
        info!(cli = %self.cli_path.display(), "verifying model CLI");

        let mut probe = ExecutionRequest::new("Hello");
        probe.max_turns = 1;

        let mut events = match self.execute(probe).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "model CLI verification failed");
                return false;
            }
        };

        while let Some(item) = futures_util::StreamExt::next(&mut events).await {
            match item {
                Ok(event) if !event.fragments().is_empty() => {
                    info!("model CLI verified");
                    return true;
                }
                Ok(_) => {}
                Err(failure) => {
                    warn!(error = %failure, "model CLI verification failed");
                    return false;
                }
            }
        }

        warn!("model CLI probe returned no messages");
        false
    }
}
