//! Bot identifier.

use super::InstanceDomainError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

const MAX_BOT_ID_LENGTH: usize = 64;

/// Validated identifier of a configured bot.
///
/// Identifiers are chosen by operators, so they are strings rather than
/// generated UUIDs. Surrounding whitespace is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BotId(String);

impl BotId {
    /// Creates a validated identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceDomainError`] when the identifier is empty, longer
    /// than 64 characters, or contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(value: impl Into<String>) -> Result<Self, InstanceDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InstanceDomainError::EmptyBotId);
        }
        if trimmed.chars().count() > MAX_BOT_ID_LENGTH {
            return Err(InstanceDomainError::BotIdTooLong(trimmed.to_owned()));
        }
        let is_valid = trimmed
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'));
        if !is_valid {
            return Err(InstanceDomainError::InvalidBotId(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl TryFrom<String> for BotId {
    type Error = InstanceDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for BotId {
    type Error = InstanceDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BotId> for String {
    fn from(value: BotId) -> Self {
        value.0
    }
}

impl Borrow<str> for BotId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
