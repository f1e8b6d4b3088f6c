//! Messages and their lifecycle.
//!
//! A message is in exactly one lifecycle state at any time:
//!
//! ```text
//! pending ──► confirmed ──► deleted (terminal)
//!    │
//!    └─────► failed (removed from the timeline)
//! ```
//!
//! `pending → confirmed | failed` happens exactly once and is owned by the
//! sender's own write path; `confirmed → deleted` is owned by moderation or
//! self-delete.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;
use crate::participant::Participant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    File,
    Voice,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// Optimistic, provisional id, not yet durable.
    Pending,
    /// Durable id, visible to all participants.
    Confirmed,
    /// Rolled back; never rendered.
    Failed,
    /// Soft-deleted; row retained for audit, content hidden.
    Deleted,
}

/// Reaction map: emoji → participants who reacted with it. BTree containers
/// keep iteration (and serialisation) order stable.
pub type Reactions = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub kind: MessageKind,
    /// Weak reference by id — never an embedded copy of the original, so
    /// edits and deletions of the target cannot leave a stale snapshot here.
    pub reply_to: Option<MessageId>,
    pub state: MessageState,
    pub is_edited: bool,
    pub is_pinned: bool,
    #[serde(default)]
    pub reactions: Reactions,
    #[serde(default)]
    pub mentions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Sender profile snapshot for display; not authoritative.
    pub sender: Option<Participant>,
}

impl Message {
    pub fn is_deleted(&self) -> bool {
        self.state == MessageState::Deleted
    }

    /// Ordering key for the rendered timeline: `created_at` ascending,
    /// id as the tie-breaker so equal timestamps still order consistently.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.id.as_str())
    }

    /// Soft-delete in place: the row keeps its position, the content is
    /// hidden. Terminal — no later update resurrects it.
    pub fn mark_deleted(&mut self) {
        self.state = MessageState::Deleted;
        self.content.clear();
    }

    /// Merge an `updated` event into this message (edit, pin, reactions,
    /// mentions). Identity and placement fields are left untouched; a
    /// deleted message stays deleted.
    pub fn apply_update(&mut self, incoming: &Message) {
        if self.is_deleted() {
            return;
        }
        self.content = incoming.content.clone();
        self.is_edited = incoming.is_edited;
        self.is_pinned = incoming.is_pinned;
        self.reactions = incoming.reactions.clone();
        self.mentions = incoming.mentions.clone();
        self.updated_at = incoming.updated_at;
        if incoming.is_deleted() {
            self.mark_deleted();
        }
    }
}
