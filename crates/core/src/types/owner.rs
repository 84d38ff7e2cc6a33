//! Cart and order ownership.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Who a cart, order or AI session belongs to.
///
/// Authenticated users are keyed by user id, guests by the opaque session id
/// their client sends. A user key always wins over a session key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum OwnerKey {
    User(String),
    Session(String),
}

impl OwnerKey {
    /// Pick the owner key from the identity attached to a request.
    ///
    /// Empty strings count as absent. Returns `None` when neither is present.
    #[must_use]
    pub fn resolve(user_id: Option<&str>, session_id: Option<&str>) -> Option<Self> {
        fn present(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }

        present(user_id)
            .map(|id| Self::User(id.to_owned()))
            .or_else(|| present(session_id).map(|id| Self::Session(id.to_owned())))
    }

    /// Discriminator stored in the `owner_kind` column.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Session(_) => "session",
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Session(id) => id,
        }
    }

    #[must_use]
    pub const fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// Rebuild a key from its stored `(owner_kind, owner_id)` pair.
    #[must_use]
    pub fn from_parts(kind: &str, id: String) -> Option<Self> {
        match kind {
            "user" => Some(Self::User(id)),
            "session" => Some(Self::Session(id)),
            _ => None,
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}
