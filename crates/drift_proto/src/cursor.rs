//! Opaque pagination cursors for the message history endpoints.
//!
//! A cursor pins a (created_at, id) position so "the page before this
//! message" stays stable even while new rows arrive. Clients treat the
//! encoded form as an opaque token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl PageCursor {
    pub fn encode(&self) -> String {
        // Serialising a (DateTime, String) pair cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| CursorError::Malformed(e.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| CursorError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Malformed page cursor: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encode_decode_roundtrip() {
        let cursor = PageCursor {
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 5).unwrap(),
            id: "m-99".into(),
        };
        let token = cursor.encode();
        assert!(!token.contains('='));
        assert_eq!(PageCursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(PageCursor::decode("not a cursor!").is_err());
        assert!(PageCursor::decode(&URL_SAFE_NO_PAD.encode(b"{}")).is_err());
    }
}
