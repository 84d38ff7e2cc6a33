//! Customer email address.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Reasons an [`Email`] can be rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    #[error("email must contain exactly one @ symbol")]
    BadAtSymbol,
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    #[error("email domain must contain a dot")]
    BadDomain,
}

/// A syntactically plausible email address, trimmed and lowercased.
///
/// Only the shape is checked: one `@`, a non-empty local part and a
/// dotted domain. Deliverability is not our problem.
///
/// ```
/// use fastspot_core::Email;
///
/// let email = Email::parse("  Jane@Example.com ").unwrap();
/// assert_eq!(email.as_str(), "jane@example.com");
/// assert!(Email::parse("jane@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 limit.
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an email address.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] describing the first rule the input breaks.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::BadAtSymbol)?;
        if domain.contains('@') {
            return Err(EmailError::BadAtSymbol);
        }
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        if domain.starts_with('.') || domain.ends_with('.') || !domain.contains('.') {
            return Err(EmailError::BadDomain);
        }

        Ok(Self(s.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_shapes() {
        for ok in ["a@b.co", "user.name+tag@example.com", "x@sub.example.co.uk"] {
            assert!(Email::parse(ok).is_ok(), "{ok}");
        }
    }

    #[test]
    fn test_rejections() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("nope"), Err(EmailError::BadAtSymbol));
        assert_eq!(Email::parse("a@b@c.com"), Err(EmailError::BadAtSymbol));
        assert_eq!(Email::parse("@c.com"), Err(EmailError::EmptyLocalPart));
        assert_eq!(Email::parse("a@localhost"), Err(EmailError::BadDomain));
        assert_eq!(Email::parse("a@.com"), Err(EmailError::BadDomain));

        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(EmailError::TooLong { .. })
        ));
    }

    #[test]
    fn test_normalizes_case_and_whitespace() {
        let email = Email::parse(" Sam@Example.COM\n").unwrap();
        assert_eq!(email.to_string(), "sam@example.com");
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Email = serde_json::from_str("\"sam@example.com\"").unwrap();
        assert_eq!(ok.as_str(), "sam@example.com");
        assert!(serde_json::from_str::<Email>("\"sam\"").is_err());
    }
}
