// ABOUTME: Stream reader for `data: <json>` framed agent event streams
// ABOUTME: Splits bytes into events, tracks cumulative assistant blocks, and reports done/error once

use crate::event::{parse_event, RawAgentEvent};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use tokio_util::sync::CancellationToken;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// A complete record pulled out of the byte stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(RawAgentEvent),
    Done,
}

/// Incremental line framer. Bytes are buffered until a newline arrives, so
/// multi-byte characters split across chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = decode_line(&line[..line.len() - 1]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a final line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }
}

fn decode_line(raw: &[u8]) -> Option<Frame> {
    let line = String::from_utf8_lossy(raw);
    let line = line.strip_suffix('\r').unwrap_or(&line);
    let payload = line.strip_prefix(DATA_PREFIX)?;

    if payload.trim() == DONE_SENTINEL {
        return Some(Frame::Done);
    }

    match parse_event(payload) {
        Ok(event) => Some(Frame::Event(event)),
        Err(e) => {
            let preview: String = payload.chars().take(200).collect();
            tracing::debug!(error = %e, line = %preview, "Dropping malformed stream line");
            None
        }
    }
}

/// Protocol state compensating for assistant events that repeat every
/// content block seen so far.
///
/// A block array at least as long as the previous one continues the turn,
/// so only blocks past the previous count are new. A shorter array starts a
/// new turn. This is a length heuristic with no turn identifier behind it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockTracker {
    last_assistant_block_count: usize,
}

impl BlockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` and return the `skip_blocks` to normalize it with.
    pub fn observe(&mut self, event: &RawAgentEvent) -> usize {
        match event.assistant_block_count() {
            Some(count) => {
                let skip = if count >= self.last_assistant_block_count {
                    self.last_assistant_block_count
                } else {
                    0
                };
                self.last_assistant_block_count = count;
                skip
            }
            None => {
                self.last_assistant_block_count = 0;
                0
            }
        }
    }

    pub fn last_count(&self) -> usize {
        self.last_assistant_block_count
    }
}

/// Receives everything the reader extracts from one stream.
pub trait StreamObserver {
    fn on_event(&mut self, event: RawAgentEvent, skip_blocks: usize);

    /// Called for every event carrying a session id. Duplicates are expected.
    fn on_session_id(&mut self, _session_id: &str) {}

    /// Called exactly once when the stream ends normally.
    fn on_done(&mut self);

    /// Called exactly once on transport failure. Never called for cancellation.
    fn on_error(&mut self, reason: &str);
}

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Done,
    Failed,
    Cancelled,
}

/// Cancels an in-flight stream. Cloneable, idempotent, and safe to call
/// after the stream has finished.
#[derive(Debug, Clone, Default)]
pub struct StreamHandle {
    token: CancellationToken,
}

impl StreamHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Drive `stream` to completion, feeding each event to `observer` in order.
pub async fn read_stream<S, B, E, O>(
    stream: S,
    observer: &mut O,
    handle: &StreamHandle,
) -> Termination
where
    O: StreamObserver + ?Sized,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    futures::pin_mut!(stream);
    let mut decoder = SseDecoder::new();
    let mut tracker = BlockTracker::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = handle.token().cancelled() => {
                tracing::debug!("Stream cancelled");
                return Termination::Cancelled;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                for frame in decoder.push(chunk.as_ref()) {
                    if dispatch(frame, &mut *observer, &mut tracker) {
                        observer.on_done();
                        return Termination::Done;
                    }
                }
            }
            Some(Err(e)) => {
                if handle.is_cancelled() {
                    return Termination::Cancelled;
                }
                tracing::warn!(error = %e, "Agent stream failed");
                observer.on_error(&e.to_string());
                return Termination::Failed;
            }
            None => {
                if let Some(frame) = decoder.finish() {
                    dispatch(frame, &mut *observer, &mut tracker);
                }
                tracing::debug!("Stream closed");
                observer.on_done();
                return Termination::Done;
            }
        }
    }
}

/// Returns true when the frame is the end-of-stream sentinel.
fn dispatch<O: StreamObserver + ?Sized>(frame: Frame, observer: &mut O, tracker: &mut BlockTracker) -> bool {
    match frame {
        Frame::Done => true,
        Frame::Event(event) => {
            if let Some(session_id) = event.session_id() {
                observer.on_session_id(session_id);
            }
            let skip = tracker.observe(&event);
            observer.on_event(event, skip);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[derive(Default)]
    struct Collect {
        events: Vec<(String, usize)>,
        sessions: Vec<String>,
        done: usize,
        errors: Vec<String>,
    }

    impl StreamObserver for Collect {
        fn on_event(&mut self, event: RawAgentEvent, skip_blocks: usize) {
            self.events.push((event.kind().to_string(), skip_blocks));
        }
        fn on_session_id(&mut self, session_id: &str) {
            self.sessions.push(session_id.to_string());
        }
        fn on_done(&mut self) {
            self.done += 1;
        }
        fn on_error(&mut self, reason: &str) {
            self.errors.push(reason.to_string());
        }
    }

    fn chunks(parts: &[&str]) -> Vec<Result<Vec<u8>, String>> {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    fn assistant(n: usize) -> String {
        let blocks: Vec<String> = (0..n)
            .map(|i| format!(r#"{{"type":"text","text":"block {i}"}}"#))
            .collect();
        format!(
            r#"{{"type":"assistant","message":{{"content":[{}]}}}}"#,
            blocks.join(",")
        )
    }

    #[test]
    fn test_decoder_handles_split_lines() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"sys").is_empty());
        let frames = decoder.push(b"tem\"}\n\ndata: [DONE]\n\n");
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Frame::Event(RawAgentEvent::System { .. })));
        assert_eq!(frames[1], Frame::Done);
    }

    #[test]
    fn test_decoder_handles_split_utf8() {
        let line = "data: {\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"שלום\"}]}}\n";
        let bytes = line.as_bytes();
        let split = line.find("שלום").unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let frames = decoder.push(&bytes[split..]);
        let Frame::Event(RawAgentEvent::Assistant { message, .. }) = &frames[0] else {
            panic!("expected assistant frame");
        };
        assert_eq!(message.content[0]["text"], "שלום");
    }

    #[test]
    fn test_decoder_drops_noise() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": comment\nevent: ping\ndata: {broken\ndata: {\"no\":\"type\"}\n\r\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn test_decoder_strips_carriage_returns() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: [DONE]\r\n");
        assert_eq!(frames, vec![Frame::Done]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"user\"}").is_empty());
        assert!(matches!(decoder.finish(), Some(Frame::Event(RawAgentEvent::User { .. }))));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_tracker_cumulative_and_reset() {
        let mut tracker = BlockTracker::new();
        let one = parse_event(&assistant(1)).unwrap();
        let two = parse_event(&assistant(2)).unwrap();
        let result = parse_event(r#"{"type":"result","subtype":"success"}"#).unwrap();

        assert_eq!(tracker.observe(&one), 0);
        assert_eq!(tracker.observe(&two), 1);
        assert_eq!(tracker.observe(&two), 2);
        // Shorter array: new turn
        assert_eq!(tracker.observe(&one), 0);
        assert_eq!(tracker.last_count(), 1);
        assert_eq!(tracker.observe(&result), 0);
        assert_eq!(tracker.last_count(), 0);
        assert_eq!(tracker.observe(&two), 0);
    }

    #[tokio::test]
    async fn test_sentinel_ends_stream_once() {
        let body = format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\ndata: {}\n\n",
            assistant(1),
            assistant(2),
            assistant(3)
        );
        let mut obs = Collect::default();
        let handle = StreamHandle::new();
        let end = read_stream(stream::iter(chunks(&[&body])), &mut obs, &handle).await;

        assert_eq!(end, Termination::Done);
        assert_eq!(obs.done, 1);
        assert!(obs.errors.is_empty());
        assert_eq!(
            obs.events,
            vec![("assistant".to_string(), 0), ("assistant".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_close_without_sentinel_is_done() {
        let body = format!("data: {}\n\ndata: {}", assistant(1), r#"{"type":"result","session_id":"s9"}"#);
        let mut obs = Collect::default();
        let end = read_stream(stream::iter(chunks(&[&body])), &mut obs, &StreamHandle::new()).await;

        assert_eq!(end, Termination::Done);
        assert_eq!(obs.done, 1);
        assert_eq!(obs.events.len(), 2);
        assert_eq!(obs.sessions, vec!["s9".to_string()]);
    }

    #[tokio::test]
    async fn test_transport_error_reported_once() {
        let items: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: {\"type\":\"system\",\"session_id\":\"a\"}\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"data: [DONE]\n".to_vec()),
        ];
        let mut obs = Collect::default();
        let end = read_stream(stream::iter(items), &mut obs, &StreamHandle::new()).await;

        assert_eq!(end, Termination::Failed);
        assert_eq!(obs.errors, vec!["connection reset".to_string()]);
        assert_eq!(obs.done, 0);
        assert_eq!(obs.sessions, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_cancel_is_silent() {
        let handle = StreamHandle::new();
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Vec<u8>, String>>(4);
        tx.send(Ok(b"data: {\"type\":\"system\"}\n".to_vec()))
            .await
            .unwrap();

        let canceller = handle.clone();
        let reader = async {
            let mut obs = Collect::default();
            let end = read_stream(
                tokio_stream::wrappers::ReceiverStream::new(rx),
                &mut obs,
                &handle,
            )
            .await;
            (end, obs)
        };
        let cancel = async {
            tokio::task::yield_now().await;
            canceller.cancel();
            canceller.cancel();
        };
        let ((end, obs), ()) = tokio::join!(reader, cancel);

        assert_eq!(end, Termination::Cancelled);
        assert_eq!(obs.done, 0);
        assert!(obs.errors.is_empty());
        drop(tx);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_harmless() {
        let handle = StreamHandle::new();
        let mut obs = Collect::default();
        let end = read_stream(
            stream::iter(chunks(&["data: [DONE]\n\n"])),
            &mut obs,
            &handle,
        )
        .await;
        assert_eq!(end, Termination::Done);
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(obs.done, 1);
    }
}
