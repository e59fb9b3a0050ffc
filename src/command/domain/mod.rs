//! Domain model for command definitions and invocations.
//!
//! Definitions are the declarative records an operator edits; execution
//! contexts are the per-invocation snapshots handlers receive. Neither
//! depends on the connection or the script host.

mod context;
mod definition;
mod error;
mod template;
mod trigger;

pub use context::{
    BotIdentity, ChannelRef, ExecutionContext, GroupRef, InvocationOrigin, UserRef,
};
pub use definition::{CommandDefinition, CommandKind, HandlerScope};
pub use error::{CommandDomainError, ParseCommandKindError};
pub use template::{CommandTemplate, fill_placeholders};
pub use trigger::Trigger;
