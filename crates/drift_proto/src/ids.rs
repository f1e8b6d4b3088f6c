//! Message identifiers.
//!
//! A message carries either a durable id (assigned by the store) or a
//! provisional id (assigned locally while the write is in flight). The
//! provisional namespace prefix guarantees the two can never be confused,
//! even after both have passed through JSON as plain strings.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace prefix for locally-assigned ids. The store never issues ids
/// with this prefix.
pub const PROVISIONAL_PREFIX: &str = "local-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageId {
    /// Server-assigned, visible to all participants.
    Durable(String),
    /// Client-assigned, exists only in the sender's local timeline.
    Provisional(String),
}

impl MessageId {
    /// Mint a fresh provisional id for an optimistic send.
    pub fn provisional() -> Self {
        Self::Provisional(format!("{PROVISIONAL_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn durable(id: impl Into<String>) -> Self {
        Self::Durable(id.into())
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Durable(s) | Self::Provisional(s) => s,
        }
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        if s.starts_with(PROVISIONAL_PREFIX) {
            Self::Provisional(s)
        } else {
            Self::Durable(s)
        }
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        match id {
            MessageId::Durable(s) | MessageId::Provisional(s) => s,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_ids_are_namespaced_and_unique() {
        let a = MessageId::provisional();
        let b = MessageId::provisional();
        assert!(a.is_provisional());
        assert!(a.as_str().starts_with(PROVISIONAL_PREFIX));
        assert_ne!(a, b);
    }

    #[test]
    fn string_roundtrip_preserves_kind() {
        let p = MessageId::provisional();
        let d = MessageId::durable("msg-42");

        let p2 = MessageId::from(String::from(p.clone()));
        let d2 = MessageId::from(String::from(d.clone()));
        assert_eq!(p, p2);
        assert_eq!(d, d2);
        assert!(!d2.is_provisional());
    }

    #[test]
    fn serde_as_plain_string() {
        let d = MessageId::durable("msg-7");
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"msg-7\"");
        let back: MessageId = serde_json::from_str("\"msg-7\"").unwrap();
        assert_eq!(back, d);
    }
}
