// ABOUTME: Raw agent events as emitted by the CLI's stream-json output
// ABOUTME: A closed tagged union validated at the stream boundary; unknown types collapse to Unknown

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record of the agent's event stream, keyed by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawAgentEvent {
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },
    Assistant {
        #[serde(default)]
        message: AssistantBody,
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Tool results echoed back as user turns
    User {
        #[serde(default)]
        session_id: Option<String>,
    },
    Result {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        is_error: Option<bool>,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },
    Error {
        #[serde(default)]
        error: Option<Value>,
    },
    RateLimitEvent {
        #[serde(default)]
        session_id: Option<String>,
    },
    StreamEvent {
        #[serde(default)]
        session_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// The `message` object of an assistant event. `content` stays untyped so a
/// non-list payload can be told apart from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantBody {
    #[serde(default)]
    pub content: Value,
}

/// A sub-unit of an assistant event's content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// thinking, tool_result, or anything malformed
    Other,
}

impl ContentBlock {
    fn from_value(value: &Value) -> Self {
        match value.get("type").and_then(Value::as_str) {
            Some("text") => match value.get("text").and_then(Value::as_str) {
                Some(text) => ContentBlock::Text {
                    text: text.to_string(),
                },
                None => ContentBlock::Other,
            },
            Some("tool_use") => {
                let Some(name) = value.get("name").and_then(Value::as_str) else {
                    return ContentBlock::Other;
                };
                ContentBlock::ToolUse {
                    id: value
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    name: name.to_string(),
                    input: value.get("input").cloned().unwrap_or(Value::Null),
                }
            }
            _ => ContentBlock::Other,
        }
    }
}

impl AssistantBody {
    /// Content blocks in order, or `None` when `content` is not a list.
    pub fn blocks(&self) -> Option<Vec<ContentBlock>> {
        let items = self.content.as_array()?;
        Some(items.iter().map(ContentBlock::from_value).collect())
    }

    pub fn block_count(&self) -> usize {
        self.content.as_array().map(Vec::len).unwrap_or(0)
    }
}

impl RawAgentEvent {
    /// Wire name of the event type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RawAgentEvent::System { .. } => "system",
            RawAgentEvent::Assistant { .. } => "assistant",
            RawAgentEvent::User { .. } => "user",
            RawAgentEvent::Result { .. } => "result",
            RawAgentEvent::Error { .. } => "error",
            RawAgentEvent::RateLimitEvent { .. } => "rate_limit_event",
            RawAgentEvent::StreamEvent { .. } => "stream_event",
            RawAgentEvent::Unknown => "unknown",
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            RawAgentEvent::System { session_id, .. }
            | RawAgentEvent::Assistant { session_id, .. }
            | RawAgentEvent::User { session_id }
            | RawAgentEvent::Result { session_id, .. }
            | RawAgentEvent::RateLimitEvent { session_id }
            | RawAgentEvent::StreamEvent { session_id } => session_id.as_deref(),
            RawAgentEvent::Error { .. } | RawAgentEvent::Unknown => None,
        }
    }

    /// Length of the content array for assistant events, `None` otherwise.
    pub fn assistant_block_count(&self) -> Option<usize> {
        match self {
            RawAgentEvent::Assistant { message, .. } => Some(message.block_count()),
            _ => None,
        }
    }
}

/// Parse one JSON payload. Anything without a string `type` is rejected.
pub fn parse_event(payload: &str) -> serde_json::Result<RawAgentEvent> {
    serde_json::from_str(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_assistant_with_mixed_blocks() {
        let event = parse_event(
            &json!({
                "type": "assistant",
                "session_id": "abc",
                "message": {
                    "model": "claude",
                    "content": [
                        {"type": "thinking", "thinking": "hmm"},
                        {"type": "text", "text": "Hello"},
                        {"type": "tool_use", "id": "t1", "name": "Bash", "input": {"command": "ls"}}
                    ]
                }
            })
            .to_string(),
        )
        .unwrap();

        assert_eq!(event.session_id(), Some("abc"));
        assert_eq!(event.assistant_block_count(), Some(3));
        let RawAgentEvent::Assistant { message, .. } = event else {
            panic!("expected assistant event");
        };
        let blocks = message.blocks().unwrap();
        assert_eq!(blocks[0], ContentBlock::Other);
        assert_eq!(
            blocks[1],
            ContentBlock::Text {
                text: "Hello".to_string()
            }
        );
        assert!(matches!(&blocks[2], ContentBlock::ToolUse { name, .. } if name == "Bash"));
    }

    #[test]
    fn test_non_list_content_has_no_blocks() {
        let event = parse_event(r#"{"type":"assistant","message":{"content":"plain"}}"#).unwrap();
        let RawAgentEvent::Assistant { message, .. } = &event else {
            panic!("expected assistant event");
        };
        assert!(message.blocks().is_none());
        assert_eq!(event.assistant_block_count(), Some(0));
    }

    #[test]
    fn test_unknown_type_collapses() {
        let event = parse_event(r#"{"type":"banana_event","data":42}"#).unwrap();
        assert_eq!(event, RawAgentEvent::Unknown);
        assert_eq!(event.kind(), "unknown");
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(parse_event(r#"{"data":"something"}"#).is_err());
        assert!(parse_event("not json").is_err());
    }

    #[test]
    fn test_result_fields() {
        let event =
            parse_event(r#"{"type":"result","subtype":"success","result":"Done!","session_id":"s1"}"#)
                .unwrap();
        assert_eq!(
            event,
            RawAgentEvent::Result {
                subtype: Some("success".to_string()),
                is_error: None,
                result: Some("Done!".to_string()),
                session_id: Some("s1".to_string()),
            }
        );
    }

    #[test]
    fn test_rate_limit_and_stream_events() {
        let rl = parse_event(r#"{"type":"rate_limit_event","session_id":"s"}"#).unwrap();
        assert_eq!(rl.kind(), "rate_limit_event");
        let se = parse_event(r#"{"type":"stream_event","event":{"type":"message_start"}}"#).unwrap();
        assert_eq!(se.kind(), "stream_event");
        assert_eq!(se.session_id(), None);
    }

    #[test]
    fn test_tool_use_without_name_is_other() {
        let body = AssistantBody {
            content: json!([{"type": "tool_use", "id": "x"}]),
        };
        assert_eq!(body.blocks().unwrap(), vec![ContentBlock::Other]);
    }
}
