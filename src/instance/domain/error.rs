//! Error types for instance domain validation and parsing.

use super::ConnectionPhase;
use thiserror::Error;

/// Errors returned while constructing instance domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstanceDomainError {
    /// The bot identifier is empty after trimming.
    #[error("bot identifier must not be empty")]
    EmptyBotId,

    /// The bot identifier contains characters outside `[A-Za-z0-9_-]`.
    #[error(
        "bot identifier '{0}' contains invalid characters (only letters, digits, hyphens and underscores allowed)"
    )]
    InvalidBotId(String),

    /// The bot identifier exceeds the length limit.
    #[error("bot identifier exceeds 64 character limit: {0}")]
    BotIdTooLong(String),

    /// The command prefix is empty or longer than five characters.
    #[error("command prefix must be 1-5 characters, got {0} characters")]
    PrefixLength(usize),

    /// A multi-character prefix made only of letters and digits.
    #[error("multi-character prefix '{0}' must contain a symbol")]
    AlphanumericPrefix(String),

    /// Transitioning between two connection phases is invalid.
    #[error("invalid connection phase transition: {from} -> {to}")]
    InvalidPhaseTransition {
        /// Current phase.
        from: ConnectionPhase,
        /// Requested phase.
        to: ConnectionPhase,
    },
}

/// Error returned while parsing a connection phase.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown connection phase: {0}")]
pub struct ParseConnectionPhaseError(pub String);

/// Error returned while parsing a declared status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown declared status: {0}")]
pub struct ParseDeclaredStatusError(pub String);
