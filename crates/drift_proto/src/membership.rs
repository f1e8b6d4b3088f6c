//! Memberships — the role and moderation flags of one participant in one room.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Moderator,
    Admin,
    Owner,
    Leader,
}

impl Role {
    /// Privileged roles may moderate the room (delete others' messages,
    /// mute, ban).
    pub fn is_privileged(self) -> bool {
        !matches!(self, Role::Member)
    }
}

/// At most one ACTIVE membership exists per (room, participant) pair.
/// Leaving a room flips `is_active`; rows are never removed, so the
/// join/leave history survives for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub room_id: String,
    pub participant_id: String,
    pub role: Role,
    pub is_banned: bool,
    pub is_muted: bool,
    /// A mute with no expiry lasts until explicitly lifted.
    pub muted_until: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Membership {
    /// Whether the mute is in force at `now`. An expired mute no longer
    /// blocks the send path even if the flag has not been cleared yet.
    pub fn is_muted_at(&self, now: DateTime<Utc>) -> bool {
        self.is_muted && self.muted_until.map_or(true, |until| until > now)
    }
}
