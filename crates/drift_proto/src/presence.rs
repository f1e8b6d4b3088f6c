//! Typed presence payloads for the ephemeral room channel.
//!
//! Presence is never persisted and never carries durable content. The
//! payload is a tagged enum rather than a free-form key-value bag, so the
//! channel contract stays explicit as new presence kinds are added.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One participant's typing state. Superseded by any newer payload for the
/// same participant; expires locally after a fixed inactivity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingState {
    pub room_id: String,
    pub participant_id: String,
    pub display_name: String,
    pub is_typing: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresencePayload {
    Typing(TypingState),
}

impl PresencePayload {
    pub fn participant_id(&self) -> &str {
        match self {
            Self::Typing(t) => &t.participant_id,
        }
    }
}

/// What the presence side of a room subscription delivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    /// Full state snapshot on (re)subscription.
    Sync { payloads: Vec<PresencePayload> },
    Join { payload: PresencePayload },
    Leave { participant_id: String },
}
