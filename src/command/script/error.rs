//! Script host errors.

use crate::command::domain::{CommandDomainError, HandlerScope};
use thiserror::Error;

/// Errors raised while loading or running scripts.
///
/// Lua errors are captured as text because they are reported to operators
/// and users, never inspected structurally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScriptError {
    /// The source failed to parse.
    #[error("{0}")]
    Syntax(String),

    /// The script VM could not be created.
    #[error("script host unavailable: {0}")]
    Host(String),

    /// Running the chunk that registers handlers failed.
    #[error("script '{definition}' failed while loading: {message}")]
    Load {
        /// Definition identifier.
        definition: String,
        /// First line of the Lua error.
        message: String,
    },

    /// The chunk ran but registered nothing.
    #[error("script '{definition}' did not register any handler")]
    NoHandlers {
        /// Definition identifier.
        definition: String,
    },

    /// A registered handler name is not a valid trigger.
    #[error("script '{definition}' registered an invalid handler name: {source}")]
    InvalidHandlerName {
        /// Definition identifier.
        definition: String,
        /// Trigger rule that failed.
        source: CommandDomainError,
    },

    /// A handler was registered on the wrong surface for the definition kind.
    #[error("script '{definition}' registered a {found} handler '{name}' but its kind expects {expected}")]
    ScopeMismatch {
        /// Definition identifier.
        definition: String,
        /// Handler name.
        name: String,
        /// Surface the definition kind binds to.
        expected: HandlerScope,
        /// Surface the script used.
        found: HandlerScope,
    },

    /// A handler raised an error while running.
    #[error("{0}")]
    Runtime(String),
}

impl ScriptError {
    /// Wraps a Lua error raised by a running handler.
    #[must_use]
    pub fn runtime(err: &mlua::Error) -> Self {
        Self::Runtime(first_line(err))
    }
}

/// Returns the first line of a Lua error, dropping the traceback.
pub(super) fn first_line(err: &mlua::Error) -> String {
    err.to_string()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_owned()
}
