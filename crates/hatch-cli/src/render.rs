// ABOUTME: Plain-text rendering of activity blocks for the terminal
// ABOUTME: Building blocks collapse to their latest step, other blocks print every message

use hatch_core::{ActivityBlock, BlockKind, ChatMessage};
use std::fmt::Write;

/// Render `blocks` the way a collapsed chat view would show them.
pub fn render_blocks(blocks: &[ActivityBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        render_block(&mut out, block);
    }
    out
}

fn render_block(out: &mut String, block: &ActivityBlock) {
    let active = if block.is_active { " (working)" } else { "" };
    match block.kind {
        BlockKind::UserInput => {
            for message in &block.messages {
                let _ = writeln!(out, "you: {}{active}", message.content);
                if !message.images.is_empty() {
                    let _ = writeln!(out, "- {} image(s) attached", message.images.len());
                }
            }
        }
        BlockKind::Assistant => {
            for message in &block.messages {
                for line in message.content.lines() {
                    let _ = writeln!(out, "agent: {line}");
                }
            }
        }
        BlockKind::Building => {
            let latest = block.latest().map(|m| m.content.as_str()).unwrap_or_default();
            let _ = writeln!(out, "build[{}]: {latest}{active}", block.messages.len());
            if !block.files_changed.is_empty() {
                let _ = writeln!(out, "- files: {}", block.files_changed.join(", "));
            }
        }
        BlockKind::Question => {
            for message in &block.messages {
                render_question(out, message);
            }
        }
        BlockKind::Error => {
            for message in &block.messages {
                let _ = writeln!(out, "error: {}", message.content);
            }
        }
    }
}

fn render_question(out: &mut String, message: &ChatMessage) {
    let Some(data) = &message.question_data else {
        return;
    };
    if data.questions.is_empty() {
        // Irregular payload, options unknown
        for prompt in data.prompts() {
            let _ = writeln!(out, "ask: {prompt}");
        }
        return;
    }
    for question in &data.questions {
        let _ = writeln!(out, "ask: {}", question.question);
        for option in &question.options {
            if option.description.is_empty() {
                let _ = writeln!(out, "- {}", option.label);
            } else {
                let _ = writeln!(out, "- {} ({})", option.label, option.description);
            }
        }
    }
}
