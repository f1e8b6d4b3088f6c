//! Room-scoped push event stream payloads.
//!
//! The push channel delivers these at-least-once and in no guaranteed
//! order; the reconciler deduplicates and re-sorts. Every event references
//! a durable message — provisional ids never travel on this channel.

use serde::{Deserialize, Serialize};

use crate::message::Message;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    Inserted { message: Message },
    Updated { message: Message },
    Deleted { id: String },
}

impl RoomEvent {
    /// Durable id of the message the event refers to.
    pub fn message_id(&self) -> &str {
        match self {
            Self::Inserted { message } | Self::Updated { message } => message.id.as_str(),
            Self::Deleted { id } => id,
        }
    }
}
