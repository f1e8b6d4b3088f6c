//! drift_store — Collaborator contracts and the platform store client
//!
//! The messaging core delegates persistence, identity, and transport to
//! external collaborators. This crate defines those contracts as traits and
//! ships the HTTP implementation of the message-store contract.
//!
//! All store calls are single-shot: no retry or backoff lives at this
//! layer. Retry policy (and optimistic rollback) belongs to the caller.
//!
//! # Modules
//! - `traits`  — `IdentityProvider`, `MessageStore`, `Notifier`
//! - `channel` — `PushChannel` and room subscriptions
//! - `http`    — reqwest-backed `MessageStore` against the platform REST API
//! - `error`   — `StoreError`

pub mod channel;
pub mod error;
pub mod http;
pub mod traits;

pub use channel::{PushChannel, RoomSubscription};
pub use error::StoreError;
pub use http::{HttpMessageStore, StaticTokenSource, TokenSource};
pub use traits::{IdentityProvider, MessageStore, Notifier};
