// ABOUTME: Flat JSON persistence for per-project message logs
// ABOUTME: Includes a debounced writer task that coalesces bursts of changes into one flush

use crate::error::Result;
use crate::message::ChatMessage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Default delay between the last change and the flush to disk.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Message logs stored as `<dir>/<project_id>.json`.
#[derive(Debug, Clone)]
pub struct MessageStore {
    dir: PathBuf,
}

impl MessageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for a project's log. Bytes outside `[A-Za-z0-9-]` are written as
    /// `_XX` hex, so distinct ids never share a file and none escape `dir`.
    pub fn path_for(&self, project_id: &str) -> PathBuf {
        let mut safe = String::with_capacity(project_id.len());
        for byte in project_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                safe.push(char::from(byte));
            } else {
                safe.push_str(&format!("_{byte:02X}"));
            }
        }
        self.dir.join(format!("{safe}.json"))
    }

    /// Load a project's messages. A missing file is an empty log.
    pub async fn load(&self, project_id: &str) -> Result<Vec<ChatMessage>> {
        let path = self.path_for(project_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a project's log on disk. Written to a temp file then renamed.
    pub async fn save(&self, project_id: &str, messages: &[ChatMessage]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(project_id);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(messages)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(project = %project_id, count = messages.len(), "Saved message log");
        Ok(())
    }

    pub async fn clear(&self, project_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(project_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

enum PersistCommand {
    Snapshot(Vec<ChatMessage>),
    Flush(oneshot::Sender<Result<()>>),
}

/// Sends snapshots to the debounced writer. Dropping every handle flushes
/// whatever is pending and stops the writer task.
#[derive(Debug, Clone)]
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl std::fmt::Debug for PersistCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistCommand::Snapshot(m) => write!(f, "Snapshot({} messages)", m.len()),
            PersistCommand::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl PersistHandle {
    /// Queue the latest state of the log. Only the newest snapshot in a burst is written.
    pub fn schedule(&self, messages: Vec<ChatMessage>) {
        if self.tx.send(PersistCommand::Snapshot(messages)).is_err() {
            tracing::warn!("Message log writer stopped, dropping snapshot");
        }
    }

    /// Write any pending snapshot immediately and wait for it.
    pub async fn flush_now(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(PersistCommand::Flush(ack_tx)).is_err() {
            return Ok(());
        }
        ack_rx.await.unwrap_or(Ok(()))
    }
}

/// Start the debounced writer for one project.
pub fn spawn_debounced_writer(
    store: MessageStore,
    project_id: String,
    delay: Duration,
) -> (PersistHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_writer(store, project_id, delay, rx));
    (PersistHandle { tx }, task)
}

async fn run_writer(
    store: MessageStore,
    project_id: String,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) {
    let mut pending: Option<Vec<ChatMessage>> = None;

    loop {
        let command = if pending.is_some() {
            match tokio::time::timeout(delay, rx.recv()).await {
                Ok(command) => command,
                Err(_) => {
                    write_pending(&store, &project_id, &mut pending).await;
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            Some(PersistCommand::Snapshot(messages)) => pending = Some(messages),
            Some(PersistCommand::Flush(ack)) => {
                let result = match pending.take() {
                    Some(messages) => store.save(&project_id, &messages).await,
                    None => Ok(()),
                };
                let _ = ack.send(result);
            }
            None => {
                write_pending(&store, &project_id, &mut pending).await;
                break;
            }
        }
    }
}

async fn write_pending(store: &MessageStore, project_id: &str, pending: &mut Option<Vec<ChatMessage>>) {
    if let Some(messages) = pending.take() {
        if let Err(e) = store.save(project_id, &messages).await {
            tracing::error!(error = %e, project = %project_id, "Failed to persist message log");
        }
    }
}
