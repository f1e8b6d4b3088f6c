//! Push-channel contract: room-scoped event stream plus the parallel
//! ephemeral presence channel.
//!
//! Delivery is at-least-once and arrival order is not guaranteed; the
//! reconciler on the consuming side deduplicates and re-sorts. Dropping a
//! `RoomSubscription` unsubscribes — the transport observes the closed
//! receivers and tears the room channel down.

use async_trait::async_trait;
use drift_proto::{PresenceEvent, PresencePayload, RoomEvent};
use tokio::sync::mpsc;

use crate::error::StoreError;

/// Live handles for one room. At most one subscription per room should be
/// alive at a time; the engine replaces the old one before opening a new one.
pub struct RoomSubscription {
    pub room_id: String,
    /// Durable-message events: inserted / updated / deleted.
    pub events: mpsc::Receiver<RoomEvent>,
    /// Ephemeral presence events; state is discarded on unsubscribe.
    pub presence: mpsc::Receiver<PresenceEvent>,
}

#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(&self, room_id: &str) -> Result<RoomSubscription, StoreError>;

    /// Broadcast the local participant's presence payload on the room's
    /// ephemeral channel. Never carries durable content.
    async fn track(&self, room_id: &str, payload: PresencePayload) -> Result<(), StoreError>;
}
