//! API request/response types for the message-store endpoints.
//! These map directly to JSON bodies on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;
use crate::membership::{Membership, Role};
use crate::message::{Message, MessageKind, MessageState, Reactions};
use crate::participant::Participant;
use crate::room::{Room, RoomKind};

// ── Participants ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRowDto {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl From<ParticipantRowDto> for Participant {
    fn from(row: ParticipantRowDto) -> Self {
        Participant {
            id: row.id,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParticipantRequest {
    /// Identity id this profile belongs to — unique per participant; the
    /// store rejects a second insert for the same identity with a conflict.
    pub identity_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

// ── Rooms ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRowDto {
    pub id: String,
    pub name: String,
    pub kind: RoomKind,
    pub owner_id: Option<String>,
    pub is_active: bool,
    pub member_count: Option<u32>,
    pub max_members: Option<u32>,
}

impl From<RoomRowDto> for Room {
    fn from(row: RoomRowDto) -> Self {
        Room {
            id: row.id,
            name: row.name,
            kind: row.kind,
            owner_id: row.owner_id,
            is_active: row.is_active,
            member_count: row.member_count,
            max_members: row.max_members,
        }
    }
}

// ── Memberships ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipRowDto {
    pub room_id: String,
    pub participant_id: String,
    pub role: Role,
    pub is_banned: bool,
    pub is_muted: bool,
    pub muted_until: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
    pub is_active: bool,
}

impl From<MembershipRowDto> for Membership {
    fn from(row: MembershipRowDto) -> Self {
        Membership {
            room_id: row.room_id,
            participant_id: row.participant_id,
            role: row.role,
            is_banned: row.is_banned,
            is_muted: row.is_muted,
            muted_until: row.muted_until,
            joined_at: row.joined_at,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMembershipRequest {
    pub room_id: String,
    pub participant_id: String,
    pub role: Role,
}

/// Partial membership update. Absent fields are left unchanged by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_banned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl MembershipPatch {
    pub fn role(role: Role) -> Self {
        Self { role: Some(role), ..Self::default() }
    }

    pub fn mute_until(until: Option<DateTime<Utc>>) -> Self {
        Self { is_muted: Some(true), muted_until: until, ..Self::default() }
    }

    pub fn unmute() -> Self {
        Self { is_muted: Some(false), ..Self::default() }
    }

    pub fn banned(banned: bool) -> Self {
        Self { is_banned: Some(banned), ..Self::default() }
    }

    pub fn deactivate() -> Self {
        Self { is_active: Some(false), ..Self::default() }
    }
}

// ── Messages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRowDto {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageKind,
    pub reply_to_id: Option<String>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub is_pinned: bool,
    #[serde(default)]
    pub reactions: Reactions,
    #[serde(default)]
    pub mentions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Sender metadata joined in by the store for display.
    pub sender: Option<ParticipantRowDto>,
}

impl From<MessageRowDto> for Message {
    fn from(row: MessageRowDto) -> Self {
        let state = if row.is_deleted {
            MessageState::Deleted
        } else {
            MessageState::Confirmed
        };
        Message {
            id: MessageId::durable(row.id),
            room_id: row.room_id,
            sender_id: row.sender_id,
            content: if state == MessageState::Deleted { String::new() } else { row.content },
            kind: row.message_type,
            reply_to: row.reply_to_id.map(MessageId::durable),
            state,
            is_edited: row.is_edited,
            is_pinned: row.is_pinned,
            reactions: row.reactions,
            mentions: row.mentions,
            created_at: row.created_at,
            updated_at: row.updated_at,
            sender: row.sender.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessageRequest {
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
}

// ── Reactions ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionRequest {
    pub participant_id: String,
    pub emoji: String,
}

// ── Common ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deleted_row_maps_to_hidden_content() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let row = MessageRowDto {
            id: "m-1".into(),
            room_id: "r-1".into(),
            sender_id: "p-1".into(),
            content: "should not survive".into(),
            message_type: MessageKind::Text,
            reply_to_id: Some("m-0".into()),
            is_edited: false,
            is_deleted: true,
            is_pinned: false,
            reactions: Reactions::new(),
            mentions: vec![],
            created_at: at,
            updated_at: at,
            sender: None,
        };
        let message = Message::from(row);
        assert!(message.is_deleted());
        assert!(message.content.is_empty());
        assert_eq!(message.reply_to, Some(MessageId::durable("m-0")));
    }

    #[test]
    fn membership_patch_serialises_only_set_fields() {
        let patch = MembershipPatch::role(Role::Moderator);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "moderator" }));
    }
}
