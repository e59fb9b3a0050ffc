//! Validation outcomes.

use crate::command::domain::CommandDomainError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Reason a definition was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RejectionReason {
    /// Trigger text failed its rules.
    #[error(transparent)]
    Trigger(#[from] CommandDomainError),

    /// A `simple` definition has no response template.
    #[error("response template is required for simple commands")]
    MissingResponse,

    /// A response template or variation is empty.
    #[error("response template must not be empty")]
    EmptyResponse,

    /// A response template or variation is too long.
    #[error("response template is {length} characters (maximum {max_length})")]
    ResponseTooLong {
        /// Actual length in characters.
        length: usize,
        /// Configured limit.
        max_length: usize,
    },

    /// A code-based definition has empty or whitespace-only source.
    #[error("source must not be empty")]
    EmptySource,

    /// The source exceeds the configured limit.
    #[error("source is {length} characters (maximum {max_length})")]
    SourceTooLong {
        /// Actual length in characters.
        length: usize,
        /// Configured limit.
        max_length: usize,
    },

    /// The registration call for the definition's kind is absent.
    #[error("source must register its handler with `{marker}`")]
    MissingRegistrationMarker {
        /// Expected registration call.
        marker: String,
    },

    /// No handler receiving the invocation context was found.
    #[error("source must define a handler function taking `ctx`")]
    MissingEntryPoint,

    /// The source does not parse.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The source contains a denylisted construct.
    #[error("source uses a forbidden construct ({label}): `{fragment}`")]
    Denylisted {
        /// Denylist entry label.
        label: String,
        /// Matched source fragment.
        fragment: String,
    },
}

/// Non-fatal finding attached to an accepted or rejected definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", content = "detail", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// The trigger collides with a reserved name.
    ReservedTrigger(String),
    /// The script never calls a suspending host function.
    NoAwaitedCall,
    /// The script never produces a user-visible reply.
    NoReply,
    /// The script does not use protected calls.
    NoErrorHandling,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReservedTrigger(trigger) => write!(formatter, "'{trigger}' is a reserved name"),
            Self::NoAwaitedCall => formatter.write_str("handler never awaits a host call"),
            Self::NoReply => formatter.write_str("handler never replies to the user"),
            Self::NoErrorHandling => {
                formatter.write_str("handler has no error handling (pcall/xpcall)")
            }
        }
    }
}

/// Outcome of validating one definition.
///
/// Accepted when no rejection reasons were collected. Warnings never affect
/// acceptance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    rejections: Vec<RejectionReason>,
    warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Builds a result from collected findings.
    #[must_use]
    pub const fn new(rejections: Vec<RejectionReason>, warnings: Vec<ValidationWarning>) -> Self {
        Self {
            rejections,
            warnings,
        }
    }

    /// Returns whether the definition was accepted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.rejections.is_empty()
    }

    /// Returns a human-readable reason for the verdict.
    #[must_use]
    pub fn reason(&self) -> String {
        if self.rejections.is_empty() {
            return "command definition is valid".to_owned();
        }
        self.rejections
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Returns the collected rejection reasons.
    #[must_use]
    pub fn rejections(&self) -> &[RejectionReason] {
        &self.rejections
    }

    /// Returns the collected warnings.
    #[must_use]
    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    /// Returns whether any rejection satisfies `predicate`.
    #[must_use]
    pub fn rejected_for(&self, predicate: impl Fn(&RejectionReason) -> bool) -> bool {
        self.rejections.iter().any(predicate)
    }
}
