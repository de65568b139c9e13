//! Anonymous session token type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`SessionToken`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum SessionTokenError {
    /// The input string is empty.
    #[error("session token cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("session token must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains characters outside the allowed alphabet.
    #[error("session token may only contain ASCII letters and digits")]
    InvalidCharacter,
}

/// An anonymous session token issued by the session provider.
///
/// The engine never mints tokens itself - it only keys guest carts by tokens
/// handed to it with each request. Validation here guards against garbage
/// reaching the store as a cart key.
///
/// ## Constraints
///
/// - Length: 1-40 characters (session backends use 32-40 char keys)
/// - ASCII letters and digits only
///
/// ## Examples
///
/// ```
/// use verdant_core::SessionToken;
///
/// assert!(SessionToken::parse("8f14e45fceea167a5a36dedd4bea2543").is_ok());
/// assert!(SessionToken::parse("").is_err());
/// assert!(SessionToken::parse("has spaces").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Maximum length of a session token.
    pub const MAX_LENGTH: usize = 40;

    /// Parse a `SessionToken` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Is longer than 40 characters
    /// - Contains characters other than ASCII letters and digits
    pub fn parse(s: &str) -> Result<Self, SessionTokenError> {
        if s.is_empty() {
            return Err(SessionTokenError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(SessionTokenError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SessionTokenError::InvalidCharacter);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `SessionToken` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionToken {
    type Err = SessionTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tokens() {
        assert!(SessionToken::parse("abc123").is_ok());
        assert!(SessionToken::parse(&"a".repeat(40)).is_ok());
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            SessionToken::parse(""),
            Err(SessionTokenError::Empty)
        ));
    }

    #[test]
    fn test_long_token_rejected() {
        assert!(matches!(
            SessionToken::parse(&"a".repeat(41)),
            Err(SessionTokenError::TooLong { max: 40 })
        ));
    }

    #[test]
    fn test_invalid_characters_rejected() {
        assert!(matches!(
            SessionToken::parse("has-hyphen"),
            Err(SessionTokenError::InvalidCharacter)
        ));
        assert!(matches!(
            SessionToken::parse("has space"),
            Err(SessionTokenError::InvalidCharacter)
        ));
    }
}
