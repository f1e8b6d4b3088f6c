//! drift_proto — Shared types for the Driftchat room messaging core
//!
//! Everything that crosses a boundary lives here: entity models, the
//! room event stream payloads, presence payloads, and the JSON DTOs the
//! store client speaks. All wire types are serialised to JSON and use
//! snake_case field naming.
//!
//! # Modules
//! - `ids`        — Durable vs provisional message identifiers
//! - `participant`— Participant profiles and authenticated identities
//! - `room`       — Rooms and room kinds
//! - `membership` — Memberships, roles, mute/ban flags
//! - `message`    — Messages, lifecycle states, reactions
//! - `presence`   — Typed ephemeral presence payloads (typing)
//! - `event`      — Room-scoped push event stream payloads
//! - `cursor`     — Opaque pagination cursors
//! - `api`        — Request/response DTOs for the store endpoints
//! - `mentions`   — @mention extraction from message content

pub mod api;
pub mod cursor;
pub mod event;
pub mod ids;
pub mod membership;
pub mod mentions;
pub mod message;
pub mod participant;
pub mod presence;
pub mod room;

pub use cursor::PageCursor;
pub use event::RoomEvent;
pub use ids::MessageId;
pub use membership::{Membership, Role};
pub use message::{Message, MessageKind, MessageState};
pub use participant::{Identity, Participant};
pub use presence::{PresenceEvent, PresencePayload, TypingState};
pub use room::{Room, RoomKind};
