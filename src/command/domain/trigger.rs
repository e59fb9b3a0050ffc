//! Validated trigger text.

use super::CommandDomainError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Text that invokes a command, restricted to `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Trigger(String);

impl Trigger {
    /// Default upper bound on trigger length, in characters.
    pub const DEFAULT_MAX_LENGTH: usize = 32;

    /// Creates a trigger bounded by [`Self::DEFAULT_MAX_LENGTH`].
    ///
    /// # Errors
    ///
    /// Returns [`CommandDomainError`] when the text is empty, too long, or
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(value: impl Into<String>) -> Result<Self, CommandDomainError> {
        Self::with_max_length(value, Self::DEFAULT_MAX_LENGTH)
    }

    /// Creates a trigger bounded by `max_length` characters.
    ///
    /// # Errors
    ///
    /// Returns [`CommandDomainError`] when the text is empty, longer than
    /// `max_length`, or contains characters outside `[A-Za-z0-9_-]`.
    pub fn with_max_length(
        value: impl Into<String>,
        max_length: usize,
    ) -> Result<Self, CommandDomainError> {
        let raw = value.into();
        if raw.is_empty() {
            return Err(CommandDomainError::EmptyTrigger);
        }
        if raw.chars().count() > max_length {
            return Err(CommandDomainError::TriggerTooLong {
                trigger: raw,
                max_length,
            });
        }
        if !raw.chars().all(is_trigger_char) {
            return Err(CommandDomainError::InvalidTriggerCharacters(raw));
        }
        Ok(Self(raw))
    }

    /// Returns the trigger text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const fn is_trigger_char(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '-' | '_')
}

impl fmt::Display for Trigger {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl TryFrom<String> for Trigger {
    type Error = CommandDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Trigger {
    type Error = CommandDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Trigger> for String {
    fn from(value: Trigger) -> Self {
        value.0
    }
}

impl Borrow<str> for Trigger {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Trigger {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
