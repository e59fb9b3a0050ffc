//! Port interfaces for the command context.

pub mod reply;

pub use reply::{ReplyError, ReplyResult, ReplySink};
