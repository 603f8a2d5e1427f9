// ABOUTME: Conversation state container owning the message log, blocks, and current activity
// ABOUTME: Adapts the stream reader's callbacks so each event mutates the session in arrival order

use crate::blocks::{append_to_blocks, build_blocks, ActivityBlock};
use crate::event::RawAgentEvent;
use crate::locale::{Locale, Phrase};
use crate::message::{ChatMessage, ImageAttachment};
use crate::normalize::{normalize, ActivityUpdate, SideEffects};
use crate::source::{EventSource, TurnRequest};
use crate::store::PersistHandle;
use crate::client::drive_turn;
use crate::stream::{StreamHandle, StreamObserver, Termination};
use std::collections::VecDeque;

/// Raw events kept for debugging, oldest dropped first.
pub const DEBUG_EVENT_LIMIT: usize = 500;

/// State of one project's conversation.
///
/// Single owner: all mutation goes through `&mut self`, so a second turn
/// cannot start while one is borrowed for streaming.
#[derive(Debug, Default)]
pub struct ChatSession {
    locale: Locale,
    project_id: Option<String>,
    session_id: Option<String>,
    messages: Vec<ChatMessage>,
    blocks: Vec<ActivityBlock>,
    current_activity: Option<String>,
    is_streaming: bool,
    debug_events: VecDeque<RawAgentEvent>,
}

impl ChatSession {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            ..Self::default()
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn set_session_id(&mut self, session_id: &str) {
        if self.session_id.as_deref() != Some(session_id) {
            tracing::info!(session_id = %session_id, "Agent session assigned");
            self.session_id = Some(session_id.to_string());
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn blocks(&self) -> &[ActivityBlock] {
        &self.blocks
    }

    pub fn current_activity(&self) -> Option<&str> {
        self.current_activity.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn debug_events(&self) -> impl Iterator<Item = &RawAgentEvent> {
        self.debug_events.iter()
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message.clone());
        self.blocks = append_to_blocks(std::mem::take(&mut self.blocks), message);
    }

    /// Record the user's message and mark a response as in flight.
    pub fn begin_turn(&mut self, text: &str, images: Vec<ImageAttachment>) {
        self.push(ChatMessage::user(text).with_images(images));
        self.is_streaming = true;
        self.current_activity = None;
    }

    /// Normalize one event and fold its output into the log. Returns true
    /// when a message was appended.
    pub fn apply(
        &mut self,
        event: RawAgentEvent,
        skip_blocks: usize,
        effects: &mut dyn SideEffects,
    ) -> bool {
        let out = normalize(&event, self.locale, effects, skip_blocks);

        if self.debug_events.len() == DEBUG_EVENT_LIMIT {
            self.debug_events.pop_front();
        }
        self.debug_events.push_back(event);

        match out.activity {
            ActivityUpdate::Unchanged => {}
            ActivityUpdate::Clear => self.current_activity = None,
            ActivityUpdate::Set(text) => self.current_activity = Some(text),
        }

        match out.message {
            Some(message) => {
                self.push(message);
                true
            }
            None => false,
        }
    }

    /// End the turn normally.
    pub fn finish(&mut self) {
        self.is_streaming = false;
        self.current_activity = None;
        for block in &mut self.blocks {
            block.is_active = false;
        }
    }

    /// End the turn after a transport failure. The reason is logged, the user
    /// only sees the localized retry text.
    pub fn fail(&mut self, reason: &str) {
        tracing::warn!(reason = %reason, "Turn failed");
        self.push(ChatMessage::error(Phrase::Retry.text(self.locale)));
        self.finish();
    }

    /// Replace the log wholesale, e.g. after loading from disk.
    pub fn load(&mut self, messages: Vec<ChatMessage>) {
        self.blocks = build_blocks(&messages);
        self.messages = messages;
        self.is_streaming = false;
        self.current_activity = None;
    }

    pub fn reset(&mut self) {
        let locale = self.locale;
        let project_id = self.project_id.take();
        *self = Self::new(locale);
        self.project_id = project_id;
    }

    /// Run one full turn: record the prompt, open `source`, and stream events
    /// into the session until done, failure, or cancellation through `handle`.
    pub async fn run_turn(
        &mut self,
        source: &dyn EventSource,
        text: &str,
        images: Vec<ImageAttachment>,
        ctx: TurnContext<'_>,
    ) -> Termination {
        let request = TurnRequest {
            message: text.to_string(),
            project_id: self.project_id.clone(),
            session_id: self.session_id.clone(),
            locale: self.locale,
            images: images.clone(),
        };
        self.begin_turn(text, images);
        tracing::info!(source = source.name(), "Starting turn");

        let TurnContext {
            effects,
            persist,
            handle,
        } = ctx;
        let mut observer = SessionObserver::new(self, effects, persist);
        observer.persist_snapshot();

        let termination = drive_turn(source, &request, &mut observer, handle).await;

        if termination == Termination::Cancelled {
            tracing::debug!("Turn cancelled");
            observer.session.finish();
            observer.persist_snapshot();
        }
        termination
    }
}

/// Collaborators a turn needs besides the session itself.
pub struct TurnContext<'a> {
    pub effects: &'a mut dyn SideEffects,
    pub persist: Option<&'a PersistHandle>,
    pub handle: &'a StreamHandle,
}

/// Feeds stream callbacks into a [`ChatSession`], persisting after each change.
pub struct SessionObserver<'a> {
    session: &'a mut ChatSession,
    effects: &'a mut dyn SideEffects,
    persist: Option<&'a PersistHandle>,
}

impl<'a> SessionObserver<'a> {
    pub fn new(
        session: &'a mut ChatSession,
        effects: &'a mut dyn SideEffects,
        persist: Option<&'a PersistHandle>,
    ) -> Self {
        Self {
            session,
            effects,
            persist,
        }
    }

    fn persist_snapshot(&self) {
        if let Some(persist) = self.persist {
            persist.schedule(self.session.messages().to_vec());
        }
    }
}

impl StreamObserver for SessionObserver<'_> {
    fn on_event(&mut self, event: RawAgentEvent, skip_blocks: usize) {
        if self.session.apply(event, skip_blocks, &mut *self.effects) {
            self.persist_snapshot();
        }
    }

    fn on_session_id(&mut self, session_id: &str) {
        self.session.set_session_id(session_id);
    }

    fn on_done(&mut self) {
        self.session.finish();
        self.persist_snapshot();
    }

    fn on_error(&mut self, reason: &str) {
        self.session.fail(reason);
        self.persist_snapshot();
    }
}
