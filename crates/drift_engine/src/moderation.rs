//! Local permission checks for moderation actions.
//!
//! These gate the UI and short-circuit calls that would be denied anyway.
//! The store re-validates every durable call independently — the client
//! check is an optimisation, not the security boundary.

use drift_proto::{Membership, Message};

/// A participant may delete a message they authored, or any message if
/// their role is privileged.
pub fn can_delete_message(message: &Message, membership: &Membership) -> bool {
    message.sender_id == membership.participant_id || membership.role.is_privileged()
}

/// Room moderation (mute, ban, pin, role changes) requires a privileged
/// role.
pub fn can_moderate_room(membership: &Membership) -> bool {
    membership.role.is_privileged()
}
