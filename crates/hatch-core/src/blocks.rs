// ABOUTME: Groups the flat message log into collapsible activity blocks for display
// ABOUTME: Full rebuild and single-message append share one grouping rule and give identical results

use crate::message::{ChatMessage, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    UserInput,
    Assistant,
    Building,
    Question,
    Error,
}

impl BlockKind {
    /// Kind of block a message belongs to.
    pub fn of(message: &ChatMessage) -> Self {
        if message.role == Role::User {
            BlockKind::UserInput
        } else if message.question_data.is_some() {
            BlockKind::Question
        } else if message.is_error() {
            BlockKind::Error
        } else if message.role == Role::Status {
            BlockKind::Building
        } else {
            BlockKind::Assistant
        }
    }

    /// Whether consecutive messages of this kind share a block.
    fn merges(self) -> bool {
        matches!(self, BlockKind::Building | BlockKind::Assistant)
    }
}

/// Display-only grouping of consecutive same-kind messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub messages: Vec<ChatMessage>,
    pub is_active: bool,
    pub files_changed: Vec<String>,
}

impl ActivityBlock {
    fn start(message: ChatMessage) -> Self {
        let kind = BlockKind::of(&message);
        let mut block = Self {
            id: format!("block-{}", message.id),
            kind,
            messages: Vec::new(),
            is_active: false,
            files_changed: Vec::new(),
        };
        block.absorb(message);
        block
    }

    fn absorb(&mut self, message: ChatMessage) {
        if self.kind == BlockKind::Building {
            if let Some(path) = message.file_path() {
                if !self.files_changed.iter().any(|f| f == path) {
                    self.files_changed.push(path.to_string());
                }
            }
        }
        self.messages.push(message);
    }

    /// Most recent member, typically shown as the block's summary line.
    pub fn latest(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

/// Merge `message` into the trailing block or start a new one. Returns the
/// index of the block that received it.
fn place(blocks: &mut Vec<ActivityBlock>, message: ChatMessage) -> usize {
    let kind = BlockKind::of(&message);
    if let Some(last) = blocks.last_mut() {
        if last.kind == kind && kind.merges() {
            last.absorb(message);
            return blocks.len() - 1;
        }
    }
    blocks.push(ActivityBlock::start(message));
    blocks.len() - 1
}

/// Rebuild every block from the complete message log. No block is active.
pub fn build_blocks(messages: &[ChatMessage]) -> Vec<ActivityBlock> {
    let mut blocks = Vec::new();
    for message in messages {
        place(&mut blocks, message.clone());
    }
    blocks
}

/// Reflect one new message without rescanning history. The block receiving
/// the message becomes the only active one.
pub fn append_to_blocks(mut blocks: Vec<ActivityBlock>, message: ChatMessage) -> Vec<ActivityBlock> {
    for block in &mut blocks {
        block.is_active = false;
    }
    let idx = place(&mut blocks, message);
    blocks[idx].is_active = true;
    blocks
}

/// Structural equality: kinds, member ids, and changed files, ignoring block
/// ids and active flags.
pub fn blocks_equivalent(a: &[ActivityBlock], b: &[ActivityBlock]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.kind == y.kind
                && x.files_changed == y.files_changed
                && x.messages.len() == y.messages.len()
                && x.messages.iter().zip(&y.messages).all(|(m, n)| m.id == n.id)
        })
}
