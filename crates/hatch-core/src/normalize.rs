// ABOUTME: Turns one raw agent event into at most one chat message plus an activity update
// ABOUTME: Translates tool mechanics into plain-language status text in the user's locale

use crate::event::{ContentBlock, RawAgentEvent};
use crate::locale::{Locale, Phrase};
use crate::message::{ChatMessage, QuestionData, ToolInput};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static LIVE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://[a-zA-Z0-9-]+\.vercel\.app").expect("valid regex"));

static STEP_COMPLETE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"progress\.sh complete (\d+)").expect("valid regex"));

/// Command substrings mapped to status text. First match wins.
const COMMAND_PHRASES: &[(&str, Phrase<'static>)] = &[
    ("create-next-app", Phrase::SettingUp),
    ("npm run build", Phrase::CheckingBuild),
    ("npm run dev", Phrase::StartingPreview),
    ("git push", Phrase::SavingProject),
    ("git init", Phrase::InitializingProject),
    ("git commit", Phrase::SavingCheckpoint),
    ("npx vercel", Phrase::Publishing),
    ("npm install", Phrase::AddingComponents),
    ("npx shadcn", Phrase::AddingUiComponents),
    ("mkdir", Phrase::SettingUpFolders),
];

/// Tools whose calls are internal and never shown.
const SILENT_TOOLS: &[&str] = &["Glob", "Grep", "Read"];

/// Side effects the surrounding application wants triggered by tool activity.
pub trait SideEffects {
    fn on_dev_server_detected(&mut self) {}
    fn on_file_changed(&mut self, _path: &str) {}
    fn on_step_completed(&mut self, _step: u32) {}
    fn on_live_url(&mut self, _url: &str) {}
}

/// Ignores every side effect.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEffects;

impl SideEffects for NoEffects {}

/// What to do with the displayed "current activity" text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActivityUpdate {
    #[default]
    Unchanged,
    Clear,
    Set(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub message: Option<ChatMessage>,
    pub activity: ActivityUpdate,
}

impl Normalized {
    fn nothing() -> Self {
        Self::default()
    }

    fn cleared(message: Option<ChatMessage>) -> Self {
        Self {
            message,
            activity: ActivityUpdate::Clear,
        }
    }

    fn status(message: ChatMessage) -> Self {
        let activity = ActivityUpdate::Set(message.content.clone());
        Self {
            message: Some(message),
            activity,
        }
    }
}

/// Map one event to the minimal user-facing output.
///
/// `skip_blocks` is the index of the first assistant content block that is
/// new; earlier blocks were already handled by a previous call.
pub fn normalize(
    event: &RawAgentEvent,
    locale: Locale,
    effects: &mut dyn SideEffects,
    skip_blocks: usize,
) -> Normalized {
    match event {
        RawAgentEvent::Assistant { message, .. } => {
            let Some(blocks) = message.blocks() else {
                return Normalized::nothing();
            };
            for block in blocks.iter().skip(skip_blocks) {
                match block {
                    ContentBlock::Text { text } => {
                        if text.trim().is_empty() {
                            continue;
                        }
                        if let Some(url) = LIVE_URL.find(text) {
                            tracing::info!(url = %url.as_str(), "Live URL detected");
                            effects.on_live_url(url.as_str());
                        }
                        return Normalized {
                            message: Some(ChatMessage::assistant(text.clone())),
                            activity: ActivityUpdate::Unchanged,
                        };
                    }
                    ContentBlock::ToolUse { name, input, .. } => {
                        return normalize_tool(name, input, locale, effects);
                    }
                    ContentBlock::Other => continue,
                }
            }
            Normalized::nothing()
        }
        RawAgentEvent::Result {
            subtype, is_error, ..
        } => {
            let failed = subtype.as_deref() == Some("error") || is_error.unwrap_or(false);
            if failed {
                tracing::warn!(subtype = ?subtype, "Agent reported a failed result");
                Normalized::cleared(Some(ChatMessage::status(Phrase::Retry.text(locale))))
            } else {
                // Final text duplicates what the assistant events already streamed
                Normalized::cleared(None)
            }
        }
        RawAgentEvent::Error { error } => {
            tracing::warn!(error = ?error, "Agent reported an error");
            Normalized::cleared(Some(ChatMessage::status(Phrase::Retry.text(locale))))
        }
        RawAgentEvent::System { .. }
        | RawAgentEvent::User { .. }
        | RawAgentEvent::RateLimitEvent { .. }
        | RawAgentEvent::StreamEvent { .. }
        | RawAgentEvent::Unknown => Normalized::nothing(),
    }
}

fn normalize_tool(
    name: &str,
    input: &Value,
    locale: Locale,
    effects: &mut dyn SideEffects,
) -> Normalized {
    match name {
        "Bash" => {
            let Some(command) = input.get("command").and_then(Value::as_str) else {
                return Normalized::nothing();
            };
            tracing::debug!(command = %command, "Bash tool detected");

            if command.contains("npm run dev") || command.contains("next dev") {
                effects.on_dev_server_detected();
            }
            if let Some(step) = STEP_COMPLETE
                .captures(command)
                .and_then(|c| c[1].parse::<u32>().ok())
            {
                effects.on_step_completed(step);
            }

            let text = command_phrase(command).text(locale);
            Normalized::status(
                ChatMessage::status(text).with_tool("Bash", ToolInput::command(command)),
            )
        }
        "Write" | "Edit" => match input.get("file_path").and_then(Value::as_str) {
            Some(path) => {
                effects.on_file_changed(path);
                let file = basename(path);
                let phrase = if name == "Write" {
                    Phrase::Creating(file)
                } else {
                    Phrase::Editing(file)
                };
                Normalized::status(
                    ChatMessage::status(phrase.text(locale)).with_tool(name, ToolInput::file(path)),
                )
            }
            None => Normalized::status(
                ChatMessage::status(Phrase::MakingChanges.text(locale))
                    .with_tool(name, ToolInput::default()),
            ),
        },
        "AskUserQuestion" => match serde_json::from_value::<QuestionData>(input.clone()) {
            Ok(data) => Normalized {
                message: Some(ChatMessage::question(data)),
                activity: ActivityUpdate::Unchanged,
            },
            Err(e) => {
                tracing::debug!(error = %e, "AskUserQuestion input did not match question shape");
                Normalized::nothing()
            }
        },
        silent if SILENT_TOOLS.contains(&silent) => Normalized::nothing(),
        other => {
            tracing::debug!(tool = %other, "Ignoring tool call");
            Normalized::nothing()
        }
    }
}

fn command_phrase(command: &str) -> Phrase<'static> {
    COMMAND_PHRASES
        .iter()
        .find(|(needle, _)| command.contains(needle))
        .map(|(_, phrase)| *phrase)
        .unwrap_or(Phrase::Building)
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::parse_event;
    use crate::message::Role;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        dev_server: usize,
        files: Vec<String>,
        steps: Vec<u32>,
        urls: Vec<String>,
    }

    impl SideEffects for Recorder {
        fn on_dev_server_detected(&mut self) {
            self.dev_server += 1;
        }
        fn on_file_changed(&mut self, path: &str) {
            self.files.push(path.to_string());
        }
        fn on_step_completed(&mut self, step: u32) {
            self.steps.push(step);
        }
        fn on_live_url(&mut self, url: &str) {
            self.urls.push(url.to_string());
        }
    }

    fn event(value: Value) -> RawAgentEvent {
        parse_event(&value.to_string()).expect("valid event")
    }

    fn tool(name: &str, input: Value) -> RawAgentEvent {
        event(json!({
            "type": "assistant",
            "message": {"content": [{"type": "tool_use", "id": "t", "name": name, "input": input}]}
        }))
    }

    fn run(ev: &RawAgentEvent, locale: Locale) -> Normalized {
        normalize(ev, locale, &mut NoEffects, 0)
    }

    #[test]
    fn test_ignored_event_types_leave_activity_alone() {
        for raw in [
            json!({"type": "system", "subtype": "init", "session_id": "s"}),
            json!({"type": "rate_limit_event"}),
            json!({"type": "user", "message": {"content": []}}),
            json!({"type": "stream_event"}),
            json!({"type": "something_new"}),
        ] {
            let out = run(&event(raw), Locale::En);
            assert_eq!(out, Normalized::default());
        }
    }

    #[test]
    fn test_npm_run_build_in_hebrew() {
        let out = run(&tool("Bash", json!({"command": "npm run build"})), Locale::He);
        let msg = out.message.expect("status message");
        assert_eq!(msg.role, Role::Status);
        assert_eq!(msg.content, "בודק שהכל עובד...");
        assert_eq!(msg.tool_name.as_deref(), Some("Bash"));
        assert_eq!(
            msg.tool_input.and_then(|i| i.command).as_deref(),
            Some("npm run build")
        );
        assert_eq!(out.activity, ActivityUpdate::Set("בודק שהכל עובד...".to_string()));
    }

    #[test]
    fn test_command_table_order_and_fallback() {
        assert_eq!(command_phrase("npx create-next-app@latest app"), Phrase::SettingUp);
        assert_eq!(command_phrase("git add . && git commit -m x"), Phrase::SavingCheckpoint);
        assert_eq!(command_phrase("mkdir -p src/components"), Phrase::SettingUpFolders);
        assert_eq!(command_phrase("npx shadcn@latest add button"), Phrase::AddingUiComponents);
        assert_eq!(command_phrase("ls -la"), Phrase::Building);
    }

    #[test]
    fn test_bash_side_effects() {
        let mut rec = Recorder::default();
        normalize(
            &tool("Bash", json!({"command": "npm run dev &"})),
            Locale::En,
            &mut rec,
            0,
        );
        normalize(
            &tool("Bash", json!({"command": "bash progress.sh complete 3"})),
            Locale::En,
            &mut rec,
            0,
        );
        assert_eq!(rec.dev_server, 1);
        assert_eq!(rec.steps, vec![3]);
    }

    #[test]
    fn test_write_and_edit_use_basename() {
        let mut rec = Recorder::default();
        let out = normalize(
            &tool("Write", json!({"file_path": "/tmp/app/src/page.tsx", "content": "x"})),
            Locale::En,
            &mut rec,
            0,
        );
        let msg = out.message.unwrap();
        assert_eq!(msg.content, "Creating `page.tsx`...");
        assert_eq!(msg.file_path(), Some("/tmp/app/src/page.tsx"));
        assert_eq!(rec.files, vec!["/tmp/app/src/page.tsx".to_string()]);

        let out = run(&tool("Edit", json!({"file_path": "layout.tsx"})), Locale::En);
        assert_eq!(out.message.unwrap().content, "Editing `layout.tsx`...");
    }

    #[test]
    fn test_write_without_path_is_generic() {
        let out = run(&tool("Edit", json!({})), Locale::En);
        assert_eq!(out.activity, ActivityUpdate::Set("Making changes...".to_string()));
    }

    #[test]
    fn test_internal_tools_are_silent() {
        for name in ["Glob", "Grep", "Read", "TodoWrite"] {
            let out = run(&tool(name, json!({"pattern": "*.ts"})), Locale::En);
            assert!(out.message.is_none(), "{name} should be silent");
        }
    }

    #[test]
    fn test_ask_user_question() {
        let input = json!({
            "questions": [{
                "question": "Pick a color",
                "options": [{"label": "Red", "description": "warm"}]
            }]
        });
        let out = run(&tool("AskUserQuestion", input.clone()), Locale::En);
        let msg = out.message.unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "");
        assert_eq!(msg.tool_name.as_deref(), Some("AskUserQuestion"));
        assert_eq!(serde_json::to_value(msg.question_data.unwrap()).unwrap(), input);
        assert_eq!(out.activity, ActivityUpdate::Unchanged);
    }

    #[test]
    fn test_ask_user_question_without_labels_still_shown() {
        let input = json!({
            "questions": [{"question": "Which font?", "options": [{"value": "serif"}]}]
        });
        let out = run(&tool("AskUserQuestion", input.clone()), Locale::En);
        let msg = out.message.unwrap();
        assert_eq!(msg.tool_name.as_deref(), Some("AskUserQuestion"));
        let data = msg.question_data.unwrap();
        assert_eq!(data.prompts(), ["Which font?"]);
        assert_eq!(serde_json::to_value(data).unwrap(), input);
    }

    #[test]
    fn test_text_skips_blank_blocks_and_detects_live_url() {
        let mut rec = Recorder::default();
        let ev = event(json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "text", "text": "   "},
                {"type": "text", "text": "Live at https://my-site.vercel.app now"}
            ]}
        }));
        let out = normalize(&ev, Locale::En, &mut rec, 0);
        assert_eq!(
            out.message.unwrap().content,
            "Live at https://my-site.vercel.app now"
        );
        assert_eq!(rec.urls, vec!["https://my-site.vercel.app".to_string()]);
    }

    #[test]
    fn test_skip_blocks_returns_only_new_text() {
        let ev = event(json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "text", "text": "First message"},
                {"type": "text", "text": "Second message"}
            ]}
        }));
        let out = normalize(&ev, Locale::En, &mut NoEffects, 1);
        assert_eq!(out.message.unwrap().content, "Second message");
    }

    #[test]
    fn test_first_output_block_wins() {
        let ev = event(json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "tool_use", "id": "a", "name": "Bash", "input": {"command": "git init"}},
                {"type": "text", "text": "later"}
            ]}
        }));
        let out = run(&ev, Locale::En);
        assert_eq!(out.message.unwrap().content, "Initializing project...");
    }

    #[test]
    fn test_non_list_content_yields_nothing() {
        let ev = event(json!({"type": "assistant", "message": {"content": "oops"}}));
        assert_eq!(run(&ev, Locale::En), Normalized::default());
    }

    #[test]
    fn test_successful_result_only_clears_activity() {
        let ev = event(json!({"type": "result", "subtype": "success", "result": "Done!"}));
        assert_eq!(
            run(&ev, Locale::En),
            Normalized {
                message: None,
                activity: ActivityUpdate::Clear
            }
        );
    }

    #[test]
    fn test_failed_result_and_error_event_show_retry() {
        for raw in [
            json!({"type": "result", "subtype": "error"}),
            json!({"type": "result", "subtype": "error_max_turns", "is_error": true}),
            json!({"type": "error", "error": {"message": "overloaded"}}),
        ] {
            let out = run(&event(raw), Locale::En);
            let msg = out.message.expect("retry message");
            assert_eq!(msg.role, Role::Status);
            assert_eq!(msg.content, "Whoops. Give me a sec...");
            assert_eq!(out.activity, ActivityUpdate::Clear);
        }
    }

    #[test]
    fn test_basename_handles_both_separators() {
        assert_eq!(basename("a/b/c.ts"), "c.ts");
        assert_eq!(basename("C:\\proj\\d.ts"), "d.ts");
        assert_eq!(basename("plain.ts"), "plain.ts");
    }
}
