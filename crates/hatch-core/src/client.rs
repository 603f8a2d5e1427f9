// ABOUTME: Agent client that runs one turn's stream on a background tokio task
// ABOUTME: start() returns at once with a cancel handle; the observer receives callbacks from the task

use crate::error::Result;
use crate::source::{EventSource, HttpSource, TurnRequest};
use crate::stream::{read_stream, StreamHandle, StreamObserver, Termination};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Open `source` and read it into `observer`. An open failure reaches
/// `on_error` once; cancellation before or during the stream is silent.
pub async fn drive_turn<O>(
    source: &dyn EventSource,
    request: &TurnRequest,
    observer: &mut O,
    handle: &StreamHandle,
) -> Termination
where
    O: StreamObserver + ?Sized,
{
    let opened = tokio::select! {
        biased;
        _ = handle.token().cancelled() => None,
        opened = source.open(request) => Some(opened),
    };

    match opened {
        None => Termination::Cancelled,
        Some(Err(e)) => {
            tracing::warn!(source = source.name(), error = %e, "Failed to open agent stream");
            observer.on_error(&e.to_string());
            Termination::Failed
        }
        Some(Ok(stream)) => read_stream(stream, observer, handle).await,
    }
}

/// Starts agent turns against one event source.
#[derive(Clone)]
pub struct AgentClient {
    source: Arc<dyn EventSource>,
}

impl AgentClient {
    pub fn new(source: impl EventSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Client for an HTTP endpoint streaming `data:` records.
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self::new(HttpSource::new(endpoint))
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Spawn the read loop for `request`. Cancel through the returned turn's
    /// handle; the observer comes back from [`ActiveTurn::finish`].
    pub fn start<O>(&self, request: TurnRequest, observer: O) -> ActiveTurn<O>
    where
        O: StreamObserver + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let handle = StreamHandle::new();
        let task_handle = handle.clone();

        tracing::debug!(source = source.name(), "Starting agent turn");
        let task = tokio::spawn(async move {
            let mut observer = observer;
            let termination =
                drive_turn(source.as_ref(), &request, &mut observer, &task_handle).await;
            (observer, termination)
        });

        ActiveTurn { handle, task }
    }
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("source", &self.source.name())
            .finish()
    }
}

/// A turn running on a background task.
#[derive(Debug)]
pub struct ActiveTurn<O> {
    handle: StreamHandle,
    task: JoinHandle<(O, Termination)>,
}

impl<O> ActiveTurn<O> {
    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the read loop to end and take the observer back.
    pub async fn finish(self) -> Result<(O, Termination)> {
        self.task
            .await
            .map_err(|e| crate::error::Error::Task(e.to_string()))
    }
}
