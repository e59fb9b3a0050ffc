//! Supervision of many bot instances.

use super::control::{Delivery, InstanceHandle, ReloadRejection};
use super::runtime::{self, LaunchSpec};
use super::{LifecycleNotifier, SupervisorConfig};
use crate::command::domain::CommandDefinition;
use crate::command::services::{RebuildReport, VariableSubstitutionEngine};
use crate::command::validation::{CommandValidator, ValidationResult};
use crate::instance::{
    domain::{
        BotConfig, BotConfigUpdate, BotId, ConnectionPhase, DeclaredStatus, RuntimeInstanceState,
    },
    ports::{BotGateway, BotStore, BotStoreError, LifecycleEvent, LifecycleListener},
};
use mockable::Clock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

/// Errors returned by supervisor operations.
#[derive(Debug, Clone, Error)]
pub enum SupervisorError {
    /// An instance with this identifier is already running.
    #[error("bot {0} is already running")]
    AlreadyRunning(BotId),

    /// No running instance has this identifier.
    #[error("bot {0} is not running")]
    NotRunning(BotId),

    /// The token failed the minimum-length check.
    #[error("bot {0} has an invalid token")]
    InvalidCredential(BotId),

    /// A command definition was rejected by the validator.
    #[error("validation rejected: {0}")]
    ValidationRejected(String),

    /// The instance could not connect.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Some definitions failed to bind during a reload; the others were
    /// installed.
    #[error("reload left {} definition(s) unbound: {}", failed_triggers.len(), failed_triggers.join(", "))]
    RegistryPartialFailure {
        /// Labels of definitions that failed.
        failed_triggers: Vec<String>,
        /// Triggers bound after the reload.
        installed: Vec<String>,
    },

    /// The instance is in a phase that does not accept the request.
    #[error("bot {bot_id} cannot do that while {phase}")]
    InstanceNotReady {
        /// Bot identifier.
        bot_id: BotId,
        /// Phase at the time of the request.
        phase: ConnectionPhase,
    },

    /// The instance thread could not be spawned.
    #[error("failed to launch instance: {0}")]
    Launch(String),

    /// The persistence collaborator failed.
    #[error(transparent)]
    Store(#[from] BotStoreError),
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Result of a successful [`InstanceSupervisor::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartOutcome {
    /// Launched bot.
    pub bot_id: BotId,
    /// Enabled definitions that passed validation at launch.
    pub commands_loaded: usize,
}

/// How an instance stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// The instance acknowledged the stop in time.
    Graceful,
    /// The stop timed out; the instance was dropped from supervision.
    Forced,
}

impl StopOutcome {
    /// Returns whether the stop was forced.
    #[must_use]
    pub const fn is_forced(self) -> bool {
        matches!(self, Self::Forced)
    }
}

/// Result of a successful [`InstanceSupervisor::restart`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartOutcome {
    /// How the previous instance stopped, if one was running.
    pub stopped: Option<StopOutcome>,
    /// The new launch.
    pub started: StartOutcome,
}

/// Result of a successful [`InstanceSupervisor::reload_commands`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Every enabled definition was bound.
    Applied(RebuildReport),
    /// The instance did not acknowledge in time; the reload may still
    /// complete later.
    Unacknowledged,
}

/// Starts, stops, restarts and reloads bot instances.
///
/// The live instance map is the only state the control plane mutates.
/// Operations on the same identifier are serialised by a per-identifier
/// async lock, and every wait on an instance is bounded by the timeouts in
/// [`SupervisorConfig`].
pub struct InstanceSupervisor<S, G, C>
where
    S: BotStore + 'static,
    G: BotGateway + 'static,
    C: Clock + Send + Sync + 'static,
{
    store: Arc<S>,
    gateway: Arc<G>,
    clock: Arc<C>,
    validator: Arc<CommandValidator>,
    engine: Arc<VariableSubstitutionEngine>,
    notifier: Arc<LifecycleNotifier>,
    settings: SupervisorConfig,
    instances: RwLock<HashMap<BotId, InstanceHandle>>,
    last_configs: RwLock<HashMap<BotId, BotConfig>>,
    id_locks: Mutex<HashMap<BotId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S, G, C> InstanceSupervisor<S, G, C>
where
    S: BotStore + 'static,
    G: BotGateway + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a supervisor with no instances.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        clock: Arc<C>,
        settings: SupervisorConfig,
        validator: Arc<CommandValidator>,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            validator,
            engine: Arc::new(VariableSubstitutionEngine::new()),
            notifier: Arc::new(LifecycleNotifier::new()),
            settings,
            instances: RwLock::new(HashMap::new()),
            last_configs: RwLock::new(HashMap::new()),
            id_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the supervisor settings.
    #[must_use]
    pub const fn settings(&self) -> &SupervisorConfig {
        &self.settings
    }

    /// Returns the persistence collaborator.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Registers a lifecycle listener.
    pub fn subscribe(&self, listener: Arc<dyn LifecycleListener>) {
        self.notifier.subscribe(listener);
    }

    /// Launches an instance for `config.id`.
    ///
    /// Success means the launch was accepted; the handshake completes on the
    /// instance's own thread and connection failures surface only through
    /// [`Self::status`] and listeners.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::AlreadyRunning`] when a live instance
    /// exists, [`SupervisorError::InvalidCredential`] when the token is too
    /// short, [`SupervisorError::Store`] when definitions cannot be loaded,
    /// or [`SupervisorError::Launch`] when the thread cannot be spawned.
    pub async fn start(&self, config: BotConfig) -> SupervisorResult<StartOutcome> {
        let _guard = self.lock_id(&config.id).await;
        self.start_locked(config)
    }

    /// Loads the stored configuration for `bot_id` and starts it.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Store`] when no configuration is stored,
    /// plus every error of [`Self::start`].
    pub async fn start_by_id(&self, bot_id: &BotId) -> SupervisorResult<StartOutcome> {
        let _guard = self.lock_id(bot_id).await;
        let config = self.stored_config(bot_id)?;
        self.start_locked(config)
    }

    /// Stops the instance for `bot_id` and removes it from supervision.
    ///
    /// A stop that is not acknowledged within the stop timeout is reported
    /// as [`StopOutcome::Forced`]; the instance is removed either way.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotRunning`] when no instance exists.
    pub async fn stop(&self, bot_id: &BotId) -> SupervisorResult<StopOutcome> {
        let _guard = self.lock_id(bot_id).await;
        self.stop_locked(bot_id).await
    }

    /// Stops the instance if it is running, then starts a fresh one with the
    /// last known configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotRunning`] when no configuration is known
    /// for `bot_id`, plus every error of [`Self::start`].
    pub async fn restart(&self, bot_id: &BotId) -> SupervisorResult<RestartOutcome> {
        let _guard = self.lock_id(bot_id).await;
        let remembered = self
            .handle(bot_id)
            .map(|handle| handle.config().clone())
            .or_else(|| self.last_config(bot_id));
        let config = remembered.map_or_else(|| self.stored_config(bot_id), Ok)?;

        let stopped = if self.handle(bot_id).is_some() {
            Some(self.stop_locked(bot_id).await?)
        } else {
            None
        };
        let started = self.start_locked(config)?;
        Ok(RestartOutcome { stopped, started })
    }

    /// Fetches the current definitions for `bot_id` and hot-swaps the
    /// instance's registry.
    ///
    /// The store is not touched when the instance is not running.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotRunning`] when no live instance exists,
    /// [`SupervisorError::InstanceNotReady`] outside the reloadable phases,
    /// [`SupervisorError::RegistryPartialFailure`] when some definitions
    /// failed to bind, or [`SupervisorError::Store`] when definitions cannot
    /// be loaded.
    pub async fn reload_commands(&self, bot_id: &BotId) -> SupervisorResult<ReloadOutcome> {
        let _guard = self.lock_id(bot_id).await;
        let handle = self
            .handle(bot_id)
            .filter(InstanceHandle::is_active)
            .ok_or_else(|| SupervisorError::NotRunning(bot_id.clone()))?;
        let definitions = self.store.get_command_definitions(bot_id)?;

        match handle
            .request_reload(definitions, self.settings.control_ack_timeout)
            .await
        {
            Delivery::Acknowledged(Ok(report)) => reload_result(report),
            Delivery::Acknowledged(Err(ReloadRejection::NotReady(phase))) => {
                Err(SupervisorError::InstanceNotReady {
                    bot_id: bot_id.clone(),
                    phase,
                })
            }
            Delivery::TimedOut => {
                warn!(bot_id = %bot_id, "reload not acknowledged in time");
                Ok(ReloadOutcome::Unacknowledged)
            }
            Delivery::Gone => Err(SupervisorError::NotRunning(bot_id.clone())),
        }
    }

    /// Returns the latest published state of `bot_id`.
    #[must_use]
    pub fn status(&self, bot_id: &BotId) -> Option<RuntimeInstanceState> {
        self.handle(bot_id).map(|handle| handle.snapshot())
    }

    /// Returns the latest published state of every supervised instance.
    #[must_use]
    pub fn status_all(&self) -> BTreeMap<BotId, RuntimeInstanceState> {
        self.read_instances()
            .iter()
            .map(|(bot_id, handle)| (bot_id.clone(), handle.snapshot()))
            .collect()
    }

    /// Waits up to `timeout` for `bot_id` to finish connecting.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotRunning`] when no instance exists,
    /// [`SupervisorError::ConnectFailed`] when the instance failed, or
    /// [`SupervisorError::InstanceNotReady`] when it is in any other phase
    /// once the wait ends.
    pub async fn wait_until_ready(
        &self,
        bot_id: &BotId,
        timeout: Duration,
    ) -> SupervisorResult<RuntimeInstanceState> {
        let mut receiver = self
            .handle(bot_id)
            .ok_or_else(|| SupervisorError::NotRunning(bot_id.clone()))?
            .watch_state();
        let settled = |state: &RuntimeInstanceState| {
            !matches!(
                state.phase(),
                ConnectionPhase::Created | ConnectionPhase::Connecting
            )
        };
        if tokio::time::timeout(timeout, receiver.wait_for(settled))
            .await
            .is_err()
        {
            debug!(bot_id = %bot_id, "still connecting when the wait ended");
        }

        let snapshot = receiver.borrow().clone();
        match snapshot.phase() {
            ConnectionPhase::Ready => Ok(snapshot),
            ConnectionPhase::Failed => Err(SupervisorError::ConnectFailed(
                snapshot
                    .last_error()
                    .unwrap_or("connection failed")
                    .to_owned(),
            )),
            phase => Err(SupervisorError::InstanceNotReady {
                bot_id: bot_id.clone(),
                phase,
            }),
        }
    }

    /// Validates one definition without installing it.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::ValidationRejected`] with the joined
    /// reasons when the definition is rejected.
    pub fn validate_definition(
        &self,
        definition: &CommandDefinition,
    ) -> SupervisorResult<ValidationResult> {
        let verdict = self.validator.validate(definition);
        if verdict.is_accepted() {
            Ok(verdict)
        } else {
            Err(SupervisorError::ValidationRejected(verdict.reason()))
        }
    }

    /// Stops every supervised instance.
    pub async fn stop_all(&self) -> Vec<(BotId, StopOutcome)> {
        let bot_ids: Vec<BotId> = self.read_instances().keys().cloned().collect();
        let mut stopped = Vec::with_capacity(bot_ids.len());
        for bot_id in bot_ids {
            match self.stop(&bot_id).await {
                Ok(outcome) => stopped.push((bot_id, outcome)),
                Err(err) => debug!(bot_id = %bot_id, error = %err, "skipped during stop_all"),
            }
        }
        stopped
    }

    fn start_locked(&self, config: BotConfig) -> SupervisorResult<StartOutcome> {
        let bot_id = config.id.clone();
        let existing = self.handle(&bot_id);
        if existing.as_ref().is_some_and(InstanceHandle::is_active) {
            return Err(SupervisorError::AlreadyRunning(bot_id));
        }
        if !config.token.meets_min_length(self.settings.min_token_length) {
            return Err(SupervisorError::InvalidCredential(bot_id));
        }
        if existing.is_some() {
            debug!(bot_id = %bot_id, "replacing exited instance");
            self.write_instances().remove(&bot_id);
        }

        let definitions = self.store.get_command_definitions(&bot_id)?;
        let commands_loaded = definitions
            .iter()
            .filter(|definition| definition.enabled)
            .filter(|definition| self.validator.validate(definition).is_accepted())
            .count();
        let presence = config.presence.clone();
        let handle = runtime::launch(LaunchSpec {
            config: config.clone(),
            definitions,
            gateway: Arc::clone(&self.gateway),
            clock: Arc::clone(&self.clock),
            validator: Arc::clone(&self.validator),
            engine: Arc::clone(&self.engine),
            notifier: Arc::clone(&self.notifier),
            settings: self.settings.clone(),
        })
        .map_err(|err| SupervisorError::Launch(err.to_string()))?;

        self.write_instances().insert(bot_id.clone(), handle);
        self.last_configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bot_id.clone(), config);
        self.record_declared_status(
            &bot_id,
            &BotConfigUpdate::status(DeclaredStatus::Running).with_presence(presence),
        );
        self.notifier.notify(&LifecycleEvent::InstanceStarted {
            bot_id: bot_id.clone(),
            commands_loaded,
        });
        info!(bot_id = %bot_id, commands_loaded, "instance launched");
        Ok(StartOutcome {
            bot_id,
            commands_loaded,
        })
    }

    async fn stop_locked(&self, bot_id: &BotId) -> SupervisorResult<StopOutcome> {
        let handle = self
            .handle(bot_id)
            .ok_or_else(|| SupervisorError::NotRunning(bot_id.clone()))?;
        let outcome = match handle.request_stop(self.settings.stop_timeout).await {
            Delivery::Acknowledged(()) | Delivery::Gone => StopOutcome::Graceful,
            Delivery::TimedOut => {
                warn!(
                    bot_id = %bot_id,
                    timeout = ?self.settings.stop_timeout,
                    "stop not acknowledged in time, forcing"
                );
                StopOutcome::Forced
            }
        };
        drop(handle);
        self.write_instances().remove(bot_id);

        self.record_declared_status(bot_id, &BotConfigUpdate::status(DeclaredStatus::Stopped));
        self.notifier.notify(&LifecycleEvent::InstanceStopped {
            bot_id: bot_id.clone(),
            forced: outcome.is_forced(),
        });
        info!(bot_id = %bot_id, forced = outcome.is_forced(), "instance removed");
        Ok(outcome)
    }

    fn record_declared_status(&self, bot_id: &BotId, update: &BotConfigUpdate) {
        if let Err(err) = self.store.update_bot_config(bot_id, update) {
            warn!(bot_id = %bot_id, error = %err, "could not record declared status");
        }
    }

    fn stored_config(&self, bot_id: &BotId) -> SupervisorResult<BotConfig> {
        self.store
            .get_bot_config(bot_id)?
            .ok_or_else(|| SupervisorError::Store(BotStoreError::NotFound(bot_id.clone())))
    }

    fn last_config(&self, bot_id: &BotId) -> Option<BotConfig> {
        self.last_configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bot_id)
            .cloned()
    }

    fn handle(&self, bot_id: &BotId) -> Option<InstanceHandle> {
        self.read_instances().get(bot_id).cloned()
    }

    fn read_instances(&self) -> std::sync::RwLockReadGuard<'_, HashMap<BotId, InstanceHandle>> {
        self.instances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_instances(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<BotId, InstanceHandle>> {
        self.instances.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock_id(&self, bot_id: &BotId) -> IdLock<'_> {
        let lock = Arc::clone(
            self.id_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(bot_id.clone())
                .or_default(),
        );
        let mut held = IdLock {
            locks: &self.id_locks,
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }
}

/// Serialises operations on one bot id; idle entries are pruned on release.
struct IdLock<'a> {
    locks: &'a Mutex<HashMap<BotId, Arc<tokio::sync::Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

fn reload_result(report: RebuildReport) -> SupervisorResult<ReloadOutcome> {
    if report.is_complete() {
        return Ok(ReloadOutcome::Applied(report));
    }
    Err(SupervisorError::RegistryPartialFailure {
        failed_triggers: report.failed_labels(),
        installed: report.installed,
    })
}

impl<S, G, C> std::fmt::Debug for InstanceSupervisor<S, G, C>
where
    S: BotStore + 'static,
    G: BotGateway + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("InstanceSupervisor")
            .field("settings", &self.settings)
            .field("instances", &self.read_instances().len())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}
