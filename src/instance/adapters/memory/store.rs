//! In-memory persistence collaborator.

use crate::command::domain::CommandDefinition;
use crate::instance::{
    domain::{BotConfig, BotConfigUpdate, BotId},
    ports::{BotStore, BotStoreError, BotStoreResult},
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory store of bot configurations and definitions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBotStore {
    state: Arc<RwLock<InMemoryStoreState>>,
}

#[derive(Debug, Default)]
struct InMemoryStoreState {
    bots: HashMap<BotId, BotConfig>,
    commands: HashMap<BotId, Vec<CommandDefinition>>,
    writes: usize,
}

fn lock_error(err: impl ToString) -> BotStoreError {
    BotStoreError::backend(std::io::Error::other(err.to_string()))
}

impl InMemoryBotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a bot configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BotStoreError::Backend`] when lock acquisition fails.
    pub fn insert_bot(&self, config: BotConfig) -> BotStoreResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.bots.insert(config.id.clone(), config);
        Ok(())
    }

    /// Inserts a definition, replacing any with the same identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BotStoreError::Backend`] when lock acquisition fails.
    pub fn upsert_command(
        &self,
        bot_id: &BotId,
        definition: CommandDefinition,
    ) -> BotStoreResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let definitions = state.commands.entry(bot_id.clone()).or_default();
        if let Some(existing) = definitions
            .iter_mut()
            .find(|existing| existing.id == definition.id)
        {
            *existing = definition;
        } else {
            definitions.push(definition);
        }
        Ok(())
    }

    /// Removes a definition by identifier. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns [`BotStoreError::Backend`] when lock acquisition fails.
    pub fn remove_command(&self, bot_id: &BotId, command_id: &str) -> BotStoreResult<bool> {
        let mut state = self.state.write().map_err(lock_error)?;
        let Some(definitions) = state.commands.get_mut(bot_id) else {
            return Ok(false);
        };
        let before = definitions.len();
        definitions.retain(|definition| definition.id != command_id);
        Ok(definitions.len() != before)
    }

    /// Returns the number of `update_bot_config` calls that succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`BotStoreError::Backend`] when lock acquisition fails.
    pub fn write_count(&self) -> BotStoreResult<usize> {
        Ok(self.state.read().map_err(lock_error)?.writes)
    }
}

impl BotStore for InMemoryBotStore {
    fn get_bot_config(&self, bot_id: &BotId) -> BotStoreResult<Option<BotConfig>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.bots.get(bot_id).cloned())
    }

    fn get_command_definitions(&self, bot_id: &BotId) -> BotStoreResult<Vec<CommandDefinition>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.commands.get(bot_id).cloned().unwrap_or_default())
    }

    fn update_bot_config(&self, bot_id: &BotId, update: &BotConfigUpdate) -> BotStoreResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let config = state
            .bots
            .get_mut(bot_id)
            .ok_or_else(|| BotStoreError::NotFound(bot_id.clone()))?;
        config.apply(update);
        state.writes = state.writes.saturating_add(1);
        Ok(())
    }
}
