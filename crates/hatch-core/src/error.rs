// ABOUTME: Error types for the hatch-core crate.
// ABOUTME: Covers transport, process, persistence, and configuration failures.

use thiserror::Error;

/// Errors surfaced by the pipeline's I/O edges.
///
/// Malformed stream lines and upstream `error` events are not errors at this
/// level: the reader drops the former and the normalizer turns the latter
/// into a retry message.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem failure while reading or writing the message log.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The message log on disk could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network failure talking to the agent endpoint.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The agent endpoint answered with a non-success status.
    #[error("agent endpoint returned {code}: {body}")]
    Status { code: u16, body: String },

    /// The agent CLI process could not be started.
    #[error("failed to spawn agent process: {0}")]
    Spawn(String),

    /// A background turn task panicked or was aborted.
    #[error("agent turn task failed: {0}")]
    Task(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
