//! Outbound reply port used by command handlers.

use crate::command::domain::ChannelRef;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for reply delivery.
pub type ReplyResult<T> = Result<T, ReplyError>;

/// Delivers handler output to a channel.
///
/// Implementations are shared between concurrently running handler tasks
/// of one instance, so `send` takes `&self`.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Sends `content` to `channel`.
    async fn send(&self, channel: &ChannelRef, content: &str) -> ReplyResult<()>;
}

/// Errors returned by reply sinks.
#[derive(Debug, Clone, Error)]
pub enum ReplyError {
    /// The connection that owned the sink has been closed.
    #[error("connection closed before the reply could be sent")]
    ConnectionClosed,

    /// The platform refused the message.
    #[error("reply rejected: {0}")]
    Rejected(String),

    /// Generic delivery failure.
    #[error("reply delivery error: {0}")]
    Delivery(Arc<dyn std::error::Error + Send + Sync>),
}

impl ReplyError {
    /// Wraps a delivery error from the sink adapter.
    pub fn delivery(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Delivery(Arc::new(err))
    }
}
