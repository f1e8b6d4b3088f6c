use drift_store::StoreError;
use thiserror::Error;

/// Engine error taxonomy. Nothing here is fatal to the process: validation
/// and permission failures leave local state untouched, transport failures
/// roll back the optimistic entry, and a missing reconciliation target is a
/// no-op at the call site.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any network attempt (empty content, not a member,
    /// muted, leader trying to leave).
    #[error("Validation: {0}")]
    Validation(String),

    /// A durable call or subscription failed; local state was rolled back.
    #[error("Transport: {0}")]
    Transport(StoreError),

    /// The store (or a local gate) denied the action; no state mutated.
    #[error("Permission: {0}")]
    Permission(String),

    /// Target message or room is not available locally or remotely.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Denied(m) => EngineError::Permission(m),
            StoreError::NotFound(m) => EngineError::NotFound(m),
            other => EngineError::Transport(other),
        }
    }
}
