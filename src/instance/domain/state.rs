//! Observable runtime state of a bot instance.

use super::{BotId, ConnectionPhase, InstanceDomainError};
use crate::command::domain::{BotIdentity, GroupRef};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use std::collections::BTreeMap;

/// Invocation and failure counts for one handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommandUsage {
    /// Dispatched invocations.
    pub invocations: u64,
    /// Invocations whose handler failed.
    pub errors: u64,
}

/// Snapshot of a bot instance published to the control plane.
///
/// Written only by the instance's own event loop and read as cloned
/// snapshots; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeInstanceState {
    bot_id: BotId,
    phase: ConnectionPhase,
    last_error: Option<String>,
    bot_user: Option<BotIdentity>,
    groups: Vec<GroupRef>,
    prefix: String,
    prefix_commands: usize,
    slash_commands: usize,
    failed_definitions: Vec<String>,
    commands_invoked: u64,
    command_usage: BTreeMap<String, CommandUsage>,
    errors: u64,
    last_active: Option<DateTime<Utc>>,
    disconnects: u32,
    resumes: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RuntimeInstanceState {
    /// Creates the state of a freshly constructed instance.
    #[must_use]
    pub fn new(bot_id: BotId, prefix: impl Into<String>, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            bot_id,
            phase: ConnectionPhase::Created,
            last_error: None,
            bot_user: None,
            groups: Vec::new(),
            prefix: prefix.into(),
            prefix_commands: 0,
            slash_commands: 0,
            failed_definitions: Vec::new(),
            commands_invoked: 0,
            command_usage: BTreeMap::new(),
            errors: 0,
            last_active: None,
            disconnects: 0,
            resumes: 0,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Moves to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceDomainError::InvalidPhaseTransition`] when the
    /// lifecycle does not allow the move.
    pub fn transition_to(
        &mut self,
        target: ConnectionPhase,
        clock: &impl Clock,
    ) -> Result<(), InstanceDomainError> {
        if !self.phase.can_transition_to(target) {
            return Err(InstanceDomainError::InvalidPhaseTransition {
                from: self.phase,
                to: target,
            });
        }
        let previous = std::mem::replace(&mut self.phase, target);
        match target {
            ConnectionPhase::Disconnected => self.disconnects = self.disconnects.saturating_add(1),
            ConnectionPhase::Ready => {
                self.disconnects = 0;
                if previous == ConnectionPhase::Reconnecting {
                    self.resumes = self.resumes.saturating_add(1);
                }
            }
            _ => {}
        }
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Moves to [`ConnectionPhase::Failed`] and records `reason`.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceDomainError::InvalidPhaseTransition`] outside
    /// `Connecting` and `Ready`.
    pub fn fail(
        &mut self,
        reason: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), InstanceDomainError> {
        self.transition_to(ConnectionPhase::Failed, clock)?;
        self.last_error = Some(reason.into());
        self.errors = self.errors.saturating_add(1);
        Ok(())
    }

    /// Records the identity and group snapshot captured on handshake.
    pub fn capture_connection(&mut self, bot_user: BotIdentity, groups: Vec<GroupRef>) {
        self.bot_user = Some(bot_user);
        self.groups = groups;
    }

    /// Records handler counts and failed definitions after a registry build.
    pub fn record_registry(
        &mut self,
        prefix_commands: usize,
        slash_commands: usize,
        failed_definitions: Vec<String>,
    ) {
        self.prefix_commands = prefix_commands;
        self.slash_commands = slash_commands;
        self.failed_definitions = failed_definitions;
    }

    /// Records an error without changing phase.
    pub fn record_error(&mut self, message: impl Into<String>, clock: &impl Clock) {
        self.last_error = Some(message.into());
        self.errors = self.errors.saturating_add(1);
        self.updated_at = clock.utc();
    }

    /// Counts one dispatched invocation of `trigger`.
    pub fn record_invocation(&mut self, trigger: &str, clock: &impl Clock) {
        self.commands_invoked = self.commands_invoked.saturating_add(1);
        let usage = self.command_usage.entry(trigger.to_owned()).or_default();
        usage.invocations = usage.invocations.saturating_add(1);
        self.last_active = Some(clock.utc());
    }

    /// Records a failed invocation of `trigger`.
    pub fn record_command_failure(
        &mut self,
        trigger: &str,
        message: impl Into<String>,
        clock: &impl Clock,
    ) {
        let usage = self.command_usage.entry(trigger.to_owned()).or_default();
        usage.errors = usage.errors.saturating_add(1);
        self.record_error(message, clock);
    }

    /// Returns the bot identifier.
    #[must_use]
    pub const fn bot_id(&self) -> &BotId {
        &self.bot_id
    }

    /// Returns the connection phase.
    #[must_use]
    pub const fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Returns whether the instance is connected and dispatching.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase == ConnectionPhase::Ready
    }

    /// Returns the most recent error message.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the bot account identity, once connected.
    #[must_use]
    pub const fn bot_user(&self) -> Option<&BotIdentity> {
        self.bot_user.as_ref()
    }

    /// Returns the groups captured on handshake.
    #[must_use]
    pub fn groups(&self) -> &[GroupRef] {
        &self.groups
    }

    /// Returns the command prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the number of bound prefix handlers.
    #[must_use]
    pub const fn prefix_commands(&self) -> usize {
        self.prefix_commands
    }

    /// Returns the number of bound slash handlers.
    #[must_use]
    pub const fn slash_commands(&self) -> usize {
        self.slash_commands
    }

    /// Returns the labels of definitions that failed the latest build.
    #[must_use]
    pub fn failed_definitions(&self) -> &[String] {
        &self.failed_definitions
    }

    /// Returns the number of invocations dispatched.
    #[must_use]
    pub const fn commands_invoked(&self) -> u64 {
        self.commands_invoked
    }

    /// Returns per-handler counts, keyed by trigger.
    #[must_use]
    pub const fn command_usage(&self) -> &BTreeMap<String, CommandUsage> {
        &self.command_usage
    }

    /// Returns the counts for `trigger`, zero when it was never invoked.
    #[must_use]
    pub fn usage_of(&self, trigger: &str) -> CommandUsage {
        self.command_usage.get(trigger).copied().unwrap_or_default()
    }

    /// Returns every error recorded over the instance's lifetime.
    #[must_use]
    pub const fn error_count(&self) -> u64 {
        self.errors
    }

    /// Returns when a command was last dispatched.
    #[must_use]
    pub const fn last_active(&self) -> Option<DateTime<Utc>> {
        self.last_active
    }

    /// Returns disconnects since the last time the instance was ready.
    #[must_use]
    pub const fn disconnects(&self) -> u32 {
        self.disconnects
    }

    /// Returns how many times a dropped connection came back.
    #[must_use]
    pub const fn resumes(&self) -> u32 {
        self.resumes
    }

    /// Returns when the instance was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the state last changed phase or recorded an error.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
