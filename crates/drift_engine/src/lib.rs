//! drift_engine — Real-time room messaging synchronisation core
//!
//! Keeps a locally-rendered message timeline consistent while the local
//! user sends optimistically, a room-scoped push stream delivers
//! inserts/updates/deletes out of band, participants' typing state changes
//! continuously, and moderation invalidates local state asynchronously.
//!
//! The model is a single logical event loop: all I/O is awaited, nothing
//! relies on cross-callback ordering, and the merge rules in `reconcile`
//! absorb whatever order the world delivers.
//!
//! # Modules
//! - `session`    — `ChatClient` / `RoomSession`, the wiring surface
//! - `reconcile`  — merge rules for the push event stream
//! - `timeline`   — the ordered in-memory projection of a room
//! - `outbox`     — optimistic write buffer and provisional↔durable mapping
//! - `resolver`   — participant resolution with a session-scoped cache
//! - `membership` — join/leave/role/mute/ban over the store contract
//! - `presence`   — typing tracker with debounce and auto-expiry
//! - `moderation` — local permission checks
//! - `clock`      — injectable time source

pub mod clock;
pub mod error;
pub mod membership;
pub mod moderation;
pub mod outbox;
pub mod presence;
pub mod reconcile;
pub mod resolver;
pub mod session;
pub mod timeline;

#[cfg(test)]
pub(crate) mod testutil;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::EngineError;
pub use membership::MembershipManager;
pub use presence::TypingTracker;
pub use reconcile::Reconciler;
pub use resolver::ParticipantResolver;
pub use session::{ChatClient, ChatDeps, RoomSession};
pub use timeline::Timeline;
