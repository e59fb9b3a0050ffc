//! Error types for command domain values.

use thiserror::Error;

/// Errors returned while constructing command domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandDomainError {
    /// The trigger is empty.
    #[error("trigger must not be empty")]
    EmptyTrigger,

    /// The trigger exceeds the configured length limit.
    #[error("trigger '{trigger}' exceeds {max_length} characters")]
    TriggerTooLong {
        /// Offending trigger text.
        trigger: String,
        /// Configured limit in characters.
        max_length: usize,
    },

    /// The trigger contains characters outside `[A-Za-z0-9_-]`.
    #[error(
        "trigger '{0}' contains invalid characters (only letters, digits, hyphens and underscores allowed)"
    )]
    InvalidTriggerCharacters(String),
}

/// Error returned while parsing a command kind from storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown command kind: {0}")]
pub struct ParseCommandKindError(pub String);
