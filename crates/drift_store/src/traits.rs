//! Collaborator contracts consumed by the messaging core.

use async_trait::async_trait;
use drift_proto::api::{
    MembershipPatch, MessagePatch, NewMembershipRequest, NewMessageRequest, NewParticipantRequest,
};
use drift_proto::{Identity, Membership, Message, PageCursor, Participant, Room};

use crate::error::StoreError;

/// Identity collaborator: who is logged in right now, if anyone.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Option<Identity>;
}

/// The durable message store. Every call is a single request/response —
/// a failed call reports the failure and does nothing else.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Newest-first page of non-deleted messages, sender metadata attached.
    async fn fetch_page(
        &self,
        room_id: &str,
        before: Option<&PageCursor>,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError>;

    /// Durable insert. The returned message carries the server-assigned id
    /// and timestamps.
    async fn insert_message(&self, req: NewMessageRequest) -> Result<Message, StoreError>;

    /// Soft delete: the row is retained, content hidden for everyone.
    async fn soft_delete_message(&self, message_id: &str) -> Result<(), StoreError>;

    /// Partial update (edit, pin/unpin). Returns the updated row.
    async fn update_message(
        &self,
        message_id: &str,
        patch: MessagePatch,
    ) -> Result<Message, StoreError>;

    /// Add a (message, participant, emoji) reaction. Idempotent: reacting
    /// twice with the same emoji is not an error.
    async fn add_reaction(
        &self,
        message_id: &str,
        participant_id: &str,
        emoji: &str,
    ) -> Result<(), StoreError>;

    async fn remove_reaction(
        &self,
        message_id: &str,
        participant_id: &str,
        emoji: &str,
    ) -> Result<(), StoreError>;

    /// Look up a participant profile by identity id.
    async fn find_participant(&self, identity_id: &str)
        -> Result<Option<Participant>, StoreError>;

    /// Create a participant profile. The store enforces one profile per
    /// identity; a concurrent create surfaces as `Conflict` and the caller
    /// re-fetches.
    async fn create_participant(
        &self,
        req: NewParticipantRequest,
    ) -> Result<Participant, StoreError>;

    async fn find_membership(
        &self,
        room_id: &str,
        participant_id: &str,
    ) -> Result<Option<Membership>, StoreError>;

    async fn insert_membership(
        &self,
        req: NewMembershipRequest,
    ) -> Result<Membership, StoreError>;

    async fn update_membership(
        &self,
        room_id: &str,
        participant_id: &str,
        patch: MembershipPatch,
    ) -> Result<Membership, StoreError>;

    async fn fetch_room(&self, room_id: &str) -> Result<Room, StoreError>;

    /// Active rooms the participant belongs to, with member-count cache.
    async fn list_rooms(&self, participant_id: &str) -> Result<Vec<Room>, StoreError>;
}

/// Notification collaborator. Fire-and-forget: the timeline is correct
/// with or without these, so failures here are never surfaced.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn message_received(&self, room_id: &str, message: &Message);
    async fn mentioned(&self, room_id: &str, message: &Message, participant_id: &str);
}
