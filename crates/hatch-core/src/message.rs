// ABOUTME: Chat message model shared by the normalizer, block builder, and message store
// ABOUTME: Serialized camelCase so the on-disk log matches the desktop app's JSON files

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicI64, Ordering};

/// Id prefix marking a message that reports a failed turn.
pub const ERROR_ID_PREFIX: &str = "error-";

/// Who a message belongs to. `Status` is transient progress text ("Building...").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Status,
}

/// An image attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
    pub size: u64,
}

/// The subset of a tool's input the UI cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl ToolInput {
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            file_path: None,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            command: None,
            file_path: Some(path.into()),
        }
    }
}

/// One selectable answer of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Structured input of an `AskUserQuestion` tool call, kept verbatim.
///
/// When `questions` does not match the typed shape it stays raw in `extra`
/// and `questions` is empty, so odd payloads still round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct QuestionData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for QuestionData {
    fn from(mut extra: Map<String, Value>) -> Self {
        let typed = extra
            .get("questions")
            .and_then(|raw| Vec::<Question>::deserialize(raw).ok())
            .filter(|questions| !questions.is_empty());
        match typed {
            Some(questions) => {
                extra.remove("questions");
                Self { questions, extra }
            }
            None => Self {
                questions: Vec::new(),
                extra,
            },
        }
    }
}

impl QuestionData {
    /// Prompt text for display, falling back to the raw payload's `question` strings.
    pub fn prompts(&self) -> Vec<String> {
        if !self.questions.is_empty() {
            return self.questions.iter().map(|q| q.question.clone()).collect();
        }
        match self.extra.get("questions") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.get("question").and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A single entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch, non-decreasing across messages
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<ToolInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_data: Option<QuestionData>,
}

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

fn next_timestamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let prev = LAST_TIMESTAMP.fetch_max(now, Ordering::SeqCst);
    prev.max(now)
}

fn new_id(prefix: &str) -> String {
    format!("{}{}", prefix, uuid::Uuid::new_v4())
}

impl ChatMessage {
    fn new(id: String, role: Role, content: String) -> Self {
        Self {
            id,
            role,
            content,
            timestamp: next_timestamp(),
            images: Vec::new(),
            tool_name: None,
            tool_input: None,
            question_data: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(new_id("msg-"), Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(new_id("msg-"), Role::Assistant, content.into())
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self::new(new_id("msg-"), Role::Status, content.into())
    }

    /// An assistant message whose only payload is a multiple-choice prompt.
    pub fn question(data: QuestionData) -> Self {
        let mut msg = Self::new(new_id("msg-"), Role::Assistant, String::new());
        msg.tool_name = Some("AskUserQuestion".to_string());
        msg.question_data = Some(data);
        msg
    }

    /// A status message reporting a failed turn, tagged with the error id marker.
    pub fn error(content: impl Into<String>) -> Self {
        Self::new(new_id(ERROR_ID_PREFIX), Role::Status, content.into())
    }

    pub fn with_tool(mut self, name: impl Into<String>, input: ToolInput) -> Self {
        self.tool_name = Some(name.into());
        self.tool_input = Some(input);
        self
    }

    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }

    pub fn is_error(&self) -> bool {
        self.id.starts_with(ERROR_ID_PREFIX)
    }

    /// File path touched by the tool that produced this message, if any.
    pub fn file_path(&self) -> Option<&str> {
        self.tool_input.as_ref()?.file_path.as_deref()
    }
}
