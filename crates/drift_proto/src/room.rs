//! Rooms — named conversation scopes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Direct,
    Group,
    Broadcast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub kind: RoomKind,
    pub owner_id: Option<String>,
    /// Deactivated rooms are kept, never deleted.
    pub is_active: bool,
    /// Cached by the platform; may lag the true count.
    pub member_count: Option<u32>,
    pub max_members: Option<u32>,
}
