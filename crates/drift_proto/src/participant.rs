//! Participant profiles and the authenticated identities behind them.

use serde::{Deserialize, Serialize};

/// Chat participant profile. Owned by the identity collaborator; chat
/// entities reference it by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// What the identity collaborator hands us for the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    /// Display name for a participant created on first interaction:
    /// profile name, else the email local-part, else a generic placeholder.
    pub fn fallback_display_name(&self) -> String {
        if let Some(name) = self.name.as_deref() {
            let name = name.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
        if let Some(email) = self.email.as_deref() {
            if let Some(local) = email.split('@').next() {
                if !local.is_empty() {
                    return local.to_string();
                }
            }
        }
        "New member".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: Option<&str>, email: Option<&str>) -> Identity {
        Identity {
            id: "u-1".into(),
            name: name.map(Into::into),
            email: email.map(Into::into),
        }
    }

    #[test]
    fn display_name_fallback_chain() {
        assert_eq!(
            identity(Some("Lina"), Some("lina@example.com")).fallback_display_name(),
            "Lina"
        );
        assert_eq!(
            identity(Some("   "), Some("lina@example.com")).fallback_display_name(),
            "lina"
        );
        assert_eq!(identity(None, None).fallback_display_name(), "New member");
        assert_eq!(identity(None, Some("@host")).fallback_display_name(), "New member");
    }
}
