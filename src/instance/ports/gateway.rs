//! External bot platform port.

use crate::command::domain::{BotIdentity, ChannelRef, GroupRef, UserRef};
use crate::command::ports::ReplySink;
use crate::instance::domain::{BotId, BotToken};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Parameters for opening a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Bot being connected.
    pub bot_id: BotId,
    /// Platform token.
    pub token: BotToken,
    /// Custom status text to show once connected.
    pub presence: Option<String>,
}

/// Message received on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender.
    pub author: UserRef,
    /// Originating group; `None` for direct messages.
    pub group: Option<GroupRef>,
    /// Originating channel.
    pub channel: ChannelRef,
    /// Raw message text.
    pub content: String,
}

/// Slash-command interaction received on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashInvocation {
    /// Invoking user.
    pub author: UserRef,
    /// Originating group; `None` for direct messages.
    pub group: Option<GroupRef>,
    /// Originating channel.
    pub channel: ChannelRef,
    /// Command name.
    pub name: String,
    /// Option values in declaration order.
    pub options: Vec<String>,
}

/// Event delivered by a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Handshake completed.
    Ready {
        /// Bot account identity.
        bot: BotIdentity,
        /// Groups the bot belongs to at handshake time.
        groups: Vec<GroupRef>,
    },
    /// A message was posted where the bot can read it.
    Message(InboundMessage),
    /// A slash command was invoked.
    SlashCommand(SlashInvocation),
    /// The connection dropped.
    Disconnected {
        /// Platform-supplied reason.
        reason: String,
    },
    /// A dropped connection was resumed.
    Resumed,
}

/// Opens connections to the bot platform.
#[async_trait]
pub trait BotGateway: Send + Sync {
    /// Connects and authenticates.
    async fn connect(&self, request: &ConnectRequest) -> GatewayResult<Box<dyn GatewaySession>>;
}

/// One live connection.
///
/// Owned by the instance event loop. Replies from concurrently running
/// handlers go through [`GatewaySession::reply_sink`] so that they do not
/// need the session itself.
#[async_trait]
pub trait GatewaySession: Send {
    /// Waits for the next event; `None` once the stream has ended.
    async fn next_event(&mut self) -> Option<GatewayEvent>;

    /// Starts resuming a dropped connection.
    ///
    /// Success is reported later as [`GatewayEvent::Resumed`].
    async fn reconnect(&mut self) -> GatewayResult<()>;

    /// Closes the connection.
    async fn close(&mut self) -> GatewayResult<()>;

    /// Publishes the current slash-command names to the platform.
    async fn sync_slash_commands(&mut self, names: &[String]) -> GatewayResult<()>;

    /// Returns a sink for replies on this connection.
    fn reply_sink(&self) -> Arc<dyn ReplySink>;
}

/// Errors returned by gateway adapters.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The platform refused the token.
    #[error("authentication rejected by the platform")]
    AuthenticationRejected,

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The session is not connected.
    #[error("bot {0} is not connected")]
    NotConnected(BotId),

    /// Generic adapter failure.
    #[error("gateway error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl GatewayError {
    /// Wraps a runtime error from the gateway adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
