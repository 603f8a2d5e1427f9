// ABOUTME: Event sources that open one agent turn as a `data:` framed byte stream
// ABOUTME: HttpSource proxies an endpoint, CliSource spawns the CLI, ReplaySource reads a transcript

use crate::error::{Error, Result};
use crate::locale::Locale;
use crate::message::ImageAttachment;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::mpsc;

pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Sentinel record closing every framed stream.
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// What one turn sends upstream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub locale: Locale,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
}

/// Opens the upstream side of a turn. Whether events come from an HTTP
/// proxy, a child process, or a recording, they arrive framed the same way.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    async fn open(&self, request: &TurnRequest) -> Result<ByteStream>;
}

/// Wrap one JSON line as a `data:` record.
pub fn frame_line(line: &str) -> Vec<u8> {
    format!("data: {}\n\n", line.trim_end()).into_bytes()
}

fn error_frame(message: &str) -> Vec<u8> {
    frame_line(&serde_json::json!({"type": "error", "error": message}).to_string())
}

// ── HTTP ─────────────────────────────────────────────────────────────

/// POSTs the turn as JSON and streams the `text/event-stream` response.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventSource for HttpSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn open(&self, request: &TurnRequest) -> Result<ByteStream> {
        tracing::debug!(endpoint = %self.endpoint, "Opening agent stream");
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                code: status.as_u16(),
                body,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(Error::from));
        Ok(Box::pin(stream))
    }
}

// ── CLI process ──────────────────────────────────────────────────────

/// Configuration for spawning the agent CLI directly
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Path to the CLI binary (defaults to "claude")
    pub binary: String,
    /// Working directory for the agent
    pub working_dir: PathBuf,
    /// Wall-clock cap for one turn in seconds
    pub timeout_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout_secs: 300,
        }
    }
}

/// Spawns the CLI with `--output-format stream-json` and frames its stdout.
#[derive(Debug, Clone)]
pub struct CliSource {
    config: CliConfig,
}

impl CliSource {
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }

    fn args(request: &TurnRequest) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--dangerously-skip-permissions".to_string(),
        ];
        if let Some(session_id) = &request.session_id {
            args.push("--resume".to_string());
            args.push(session_id.clone());
        }
        args.push("--".to_string());
        args.push(request.message.clone());
        args
    }
}

#[async_trait]
impl EventSource for CliSource {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn open(&self, request: &TurnRequest) -> Result<ByteStream> {
        let args = Self::args(request);
        tracing::debug!(binary = %self.config.binary, cwd = %self.config.working_dir.display(), "Spawning agent CLI");

        let child = ProcessCommand::new(&self.config.binary)
            .args(&args)
            .current_dir(&self.config.working_dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Spawn(format!("{}: {e}", self.config.binary)))?;

        let (tx, rx) = mpsc::channel::<Result<Vec<u8>>>(100);
        let timeout = Duration::from_secs(self.config.timeout_secs);
        tokio::spawn(pump_cli_output(child, tx, timeout));

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }
}

async fn pump_cli_output(mut child: Child, tx: mpsc::Sender<Result<Vec<u8>>>, timeout: Duration) {
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.is_empty() {
                    tracing::debug!(stderr = %line, "Agent CLI stderr");
                }
            }
        });
    }

    let outcome = tokio::time::timeout(timeout, forward_stdout(&mut child, &tx)).await;
    let tail = match outcome {
        Ok(Ok(true)) => None,
        // Receiver went away: the turn was cancelled
        Ok(Ok(false)) => {
            tracing::debug!("Agent stream dropped, stopping CLI");
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill cancelled agent CLI");
            }
            return;
        }
        Ok(Err(e)) => Some(format!("Agent CLI failed: {e}")),
        Err(_) => {
            tracing::error!(timeout_secs = timeout.as_secs(), "Agent CLI timed out");
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill timed-out agent CLI");
            }
            Some(format!(
                "Request timed out after {} seconds",
                timeout.as_secs()
            ))
        }
    };

    if let Some(message) = tail {
        let _ = tx.send(Ok(error_frame(&message))).await;
    }
    let _ = tx.send(Ok(DONE_FRAME.to_vec())).await;
}

/// Forward stdout lines as frames. Returns false if the receiver hung up.
async fn forward_stdout(child: &mut Child, tx: &mpsc::Sender<Result<Vec<u8>>>) -> std::io::Result<bool> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
    let mut lines = BufReader::new(stdout).lines();

    loop {
        // A quiet agent must still be stopped as soon as the reader goes away
        let line = tokio::select! {
            _ = tx.closed() => return Ok(false),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        if tx.send(Ok(frame_line(&line))).await.is_err() {
            return Ok(false);
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(std::io::Error::other(format!(
            "exited with status {:?}",
            status.code()
        )));
    }
    Ok(true)
}

// ── Recorded transcript ──────────────────────────────────────────────

/// Replays a saved transcript: either an already framed SSE body or raw
/// stream-json lines (one event per line).
#[derive(Debug, Clone)]
pub struct ReplaySource {
    path: PathBuf,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Frame a transcript body the way a live source would.
    pub fn frame(content: &str) -> Vec<u8> {
        let already_framed = content
            .lines()
            .any(|line| line.starts_with("data: "));
        if already_framed {
            return content.as_bytes().to_vec();
        }
        let mut out: Vec<u8> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .flat_map(frame_line)
            .collect();
        out.extend_from_slice(DONE_FRAME);
        out
    }
}

#[async_trait]
impl EventSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn open(&self, _request: &TurnRequest) -> Result<ByteStream> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let body = Self::frame(&content);
        let chunks: Vec<Result<Vec<u8>>> = body.chunks(256).map(|c| Ok(c.to_vec())).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
