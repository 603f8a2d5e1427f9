// ABOUTME: Core library for hatch - agent event parsing, normalization, and activity blocks
// ABOUTME: Shared by the hatch CLI and any front end that renders agent turns

pub mod blocks;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod locale;
pub mod message;
pub mod normalize;
pub mod session;
pub mod source;
pub mod store;
pub mod stream;

pub use blocks::{append_to_blocks, build_blocks, ActivityBlock, BlockKind};
pub use client::{drive_turn, ActiveTurn, AgentClient};
pub use config::Config;
pub use error::{Error, Result};
pub use event::{parse_event, RawAgentEvent};
pub use locale::Locale;
pub use message::{ChatMessage, Role};
pub use normalize::{normalize, ActivityUpdate, NoEffects, Normalized, SideEffects};
pub use session::{ChatSession, TurnContext};
pub use source::{CliSource, EventSource, HttpSource, ReplaySource, TurnRequest};
pub use store::{spawn_debounced_writer, MessageStore, PersistHandle};
pub use stream::{read_stream, BlockTracker, StreamHandle, StreamObserver, Termination};
