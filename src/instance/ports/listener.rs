//! Lifecycle notification port.

use crate::instance::domain::BotId;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle event raised by the supervisor or an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// An instance was launched.
    InstanceStarted {
        /// Bot identifier.
        bot_id: BotId,
        /// Enabled definitions that passed validation at launch.
        commands_loaded: usize,
    },
    /// An instance was removed from the supervisor.
    InstanceStopped {
        /// Bot identifier.
        bot_id: BotId,
        /// Whether the stop timed out and was forced.
        forced: bool,
    },
    /// An inbound invocation matched a handler.
    CommandInvoked {
        /// Bot identifier.
        bot_id: BotId,
        /// Matched trigger.
        trigger: String,
        /// Invoking user identifier.
        user_id: String,
        /// Invocation identifier.
        invocation_id: Uuid,
    },
    /// An instance hit an error.
    InstanceError {
        /// Bot identifier.
        bot_id: BotId,
        /// Error message.
        message: String,
    },
}

impl LifecycleEvent {
    /// Returns the bot the event concerns.
    #[must_use]
    pub const fn bot_id(&self) -> &BotId {
        match self {
            Self::InstanceStarted { bot_id, .. }
            | Self::InstanceStopped { bot_id, .. }
            | Self::CommandInvoked { bot_id, .. }
            | Self::InstanceError { bot_id, .. } => bot_id,
        }
    }

    /// Returns the event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InstanceStarted { .. } => "instance_started",
            Self::InstanceStopped { .. } => "instance_stopped",
            Self::CommandInvoked { .. } => "command_invoked",
            Self::InstanceError { .. } => "instance_error",
        }
    }
}

/// Error a listener may return; logged and otherwise ignored.
#[derive(Debug, Clone, Error)]
#[error("lifecycle listener failed: {0}")]
pub struct ListenerError(pub Arc<dyn std::error::Error + Send + Sync>);

impl ListenerError {
    /// Wraps a listener failure.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}

/// Receives lifecycle events.
///
/// Called synchronously from the thread that raised the event, so
/// implementations should return quickly.
pub trait LifecycleListener: Send + Sync {
    /// Handles one event.
    ///
    /// # Errors
    ///
    /// A returned error is logged; it never affects the operation that raised
    /// the event.
    fn on_event(&self, event: &LifecycleEvent) -> Result<(), ListenerError>;
}
