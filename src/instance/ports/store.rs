//! Persistence collaborator port.

use crate::command::domain::CommandDefinition;
use crate::instance::domain::{BotConfig, BotConfigUpdate, BotId};
use std::sync::Arc;
use thiserror::Error;

/// Result type for store operations.
pub type BotStoreResult<T> = Result<T, BotStoreError>;

/// Reads bot configurations and command definitions.
///
/// Calls are synchronous and return whole records. Updates merge by key.
pub trait BotStore: Send + Sync {
    /// Returns the configuration for `bot_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BotStoreError`] when the backing store fails.
    fn get_bot_config(&self, bot_id: &BotId) -> BotStoreResult<Option<BotConfig>>;

    /// Returns every command definition stored for `bot_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BotStoreError`] when the backing store fails.
    fn get_command_definitions(&self, bot_id: &BotId) -> BotStoreResult<Vec<CommandDefinition>>;

    /// Merges `update` into the stored configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BotStoreError::NotFound`] when no configuration exists, or
    /// other [`BotStoreError`]s when the backing store fails.
    fn update_bot_config(&self, bot_id: &BotId, update: &BotConfigUpdate) -> BotStoreResult<()>;
}

/// Errors returned by store adapters.
#[derive(Debug, Clone, Error)]
pub enum BotStoreError {
    /// No configuration exists for the bot.
    #[error("bot {0} not found")]
    NotFound(BotId),

    /// Backend-specific failure.
    #[error("store error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl BotStoreError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}
