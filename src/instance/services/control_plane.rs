//! Record-returning facade over the supervisor.

use super::{InstanceSupervisor, ReloadOutcome, SupervisorError};
use crate::command::domain::CommandKind;
use crate::command::services::{TemplateCatalog, VariableSubstitutionEngine};
use crate::instance::{
    domain::{BotConfig, BotId},
    ports::{BotGateway, BotStore},
};
use mockable::Clock;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of one control-plane operation.
///
/// Serialises as `{"success": .., "message"|"error": .., ...extras}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable outcome on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Human-readable reason on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Operation-specific fields.
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl OperationReport {
    /// Creates a success record.
    #[must_use]
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            extras: Map::new(),
        }
    }

    /// Creates a failure record.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            extras: Map::new(),
        }
    }

    /// Adds an extra field.
    #[must_use]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.extras.insert(key.to_owned(), value);
        self
    }

    /// Returns an extra field.
    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }
}

impl From<SupervisorError> for OperationReport {
    fn from(err: SupervisorError) -> Self {
        let report = Self::failed(err.to_string());
        match err {
            SupervisorError::RegistryPartialFailure {
                failed_triggers,
                installed,
            } => report
                .with("failed_triggers", json!(failed_triggers))
                .with("installed", json!(installed)),
            SupervisorError::InstanceNotReady { phase, .. } => {
                report.with("phase", json!(phase.as_str()))
            }
            _ => report,
        }
    }
}

fn parse_id(raw: &str) -> Result<BotId, OperationReport> {
    BotId::new(raw).map_err(|err| OperationReport::failed(err.to_string()))
}

/// Control-plane operations returning [`OperationReport`]s.
///
/// Every call is bounded by the supervisor's timeouts and always returns a
/// definite record.
pub struct ControlPlane<S, G, C>
where
    S: BotStore + 'static,
    G: BotGateway + 'static,
    C: Clock + Send + Sync + 'static,
{
    supervisor: Arc<InstanceSupervisor<S, G, C>>,
    catalog: Arc<TemplateCatalog>,
}

impl<S, G, C> Clone for ControlPlane<S, G, C>
where
    S: BotStore + 'static,
    G: BotGateway + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            supervisor: Arc::clone(&self.supervisor),
            catalog: Arc::clone(&self.catalog),
        }
    }
}

impl<S, G, C> ControlPlane<S, G, C>
where
    S: BotStore + 'static,
    G: BotGateway + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Wraps `supervisor`, offering blueprints from `catalog`.
    #[must_use]
    pub const fn new(
        supervisor: Arc<InstanceSupervisor<S, G, C>>,
        catalog: Arc<TemplateCatalog>,
    ) -> Self {
        Self {
            supervisor,
            catalog,
        }
    }

    /// Returns the wrapped supervisor.
    #[must_use]
    pub const fn supervisor(&self) -> &Arc<InstanceSupervisor<S, G, C>> {
        &self.supervisor
    }

    /// Starts a bot with an explicit configuration.
    pub async fn start(&self, config: BotConfig) -> OperationReport {
        match self.supervisor.start(config).await {
            Ok(outcome) => OperationReport::succeeded(format!("bot {} started", outcome.bot_id))
                .with("commands_loaded", json!(outcome.commands_loaded)),
            Err(err) => err.into(),
        }
    }

    /// Starts a bot with its stored configuration.
    pub async fn start_by_id(&self, bot_id: &str) -> OperationReport {
        let id = match parse_id(bot_id) {
            Ok(id) => id,
            Err(report) => return report,
        };
        match self.supervisor.start_by_id(&id).await {
            Ok(outcome) => OperationReport::succeeded(format!("bot {id} started"))
                .with("commands_loaded", json!(outcome.commands_loaded)),
            Err(err) => err.into(),
        }
    }

    /// Stops a bot.
    pub async fn stop(&self, bot_id: &str) -> OperationReport {
        let id = match parse_id(bot_id) {
            Ok(id) => id,
            Err(report) => return report,
        };
        match self.supervisor.stop(&id).await {
            Ok(outcome) => OperationReport::succeeded(format!("bot {id} stopped"))
                .with("forced", json!(outcome.is_forced())),
            Err(err) => err.into(),
        }
    }

    /// Restarts a bot.
    pub async fn restart(&self, bot_id: &str) -> OperationReport {
        let id = match parse_id(bot_id) {
            Ok(id) => id,
            Err(report) => return report,
        };
        match self.supervisor.restart(&id).await {
            Ok(outcome) => OperationReport::succeeded(format!("bot {id} restarted"))
                .with("commands_loaded", json!(outcome.started.commands_loaded))
                .with(
                    "forced",
                    json!(outcome.stopped.is_some_and(|stopped| stopped.is_forced())),
                ),
            Err(err) => err.into(),
        }
    }

    /// Reloads a bot's commands.
    pub async fn reload(&self, bot_id: &str) -> OperationReport {
        let id = match parse_id(bot_id) {
            Ok(id) => id,
            Err(report) => return report,
        };
        match self.supervisor.reload_commands(&id).await {
            Ok(ReloadOutcome::Applied(report)) => {
                OperationReport::succeeded(format!("commands reloaded for bot {id}"))
                    .with("installed", json!(report.installed))
                    .with("skipped", json!(report.skipped))
            }
            Ok(ReloadOutcome::Unacknowledged) => OperationReport::succeeded(format!(
                "reload submitted to bot {id} but not yet acknowledged"
            ))
            .with("acknowledged", json!(false)),
            Err(err) => err.into(),
        }
    }

    /// Reports one bot's runtime state.
    #[must_use]
    pub fn status(&self, bot_id: &str) -> OperationReport {
        let id = match parse_id(bot_id) {
            Ok(id) => id,
            Err(report) => return report,
        };
        self.supervisor.status(&id).map_or_else(
            || SupervisorError::NotRunning(id.clone()).into(),
            |state| {
                OperationReport::succeeded(format!("bot {id} is {}", state.phase()))
                    .with("state", json!(state))
            },
        )
    }

    /// Reports every supervised bot's runtime state.
    #[must_use]
    pub fn status_all(&self) -> OperationReport {
        let states = self.supervisor.status_all();
        OperationReport::succeeded(format!("{} bot(s) supervised", states.len()))
            .with("instances", json!(states))
    }

    /// Summarises a bot's stored definitions and, when it is supervised,
    /// per-handler usage.
    #[must_use]
    pub fn command_stats(&self, bot_id: &str) -> OperationReport {
        let id = match parse_id(bot_id) {
            Ok(id) => id,
            Err(report) => return report,
        };
        let definitions = match self.supervisor.store().get_command_definitions(&id) {
            Ok(definitions) => definitions,
            Err(err) => return SupervisorError::from(err).into(),
        };
        let count_kind = |kind: CommandKind| {
            definitions
                .iter()
                .filter(|definition| definition.kind == kind)
                .count()
        };
        let enabled = definitions
            .iter()
            .filter(|definition| definition.enabled)
            .count();
        let state = self.supervisor.status(&id);
        let usage = state
            .as_ref()
            .map_or_else(|| json!({}), |snapshot| json!(snapshot.command_usage()));

        OperationReport::succeeded(format!("{} command(s) stored for bot {id}", definitions.len()))
            .with("total", json!(definitions.len()))
            .with("simple", json!(count_kind(CommandKind::Simple)))
            .with("code_based", json!(count_kind(CommandKind::CodeBased)))
            .with("slash_code_based", json!(count_kind(CommandKind::SlashCodeBased)))
            .with("enabled", json!(enabled))
            .with("disabled", json!(definitions.len() - enabled))
            .with(
                "total_usage",
                json!(state.as_ref().map_or(0, |snapshot| snapshot.commands_invoked())),
            )
            .with(
                "errors",
                json!(state.as_ref().map_or(0, |snapshot| snapshot.error_count())),
            )
            .with(
                "last_active",
                json!(state.as_ref().and_then(|snapshot| snapshot.last_active())),
            )
            .with("usage", usage)
    }

    /// Lists the blueprints of the catalog grouped by category.
    #[must_use]
    pub fn templates(&self) -> OperationReport {
        OperationReport::succeeded(format!("{} template(s) available", self.catalog.len()))
            .with("categories", json!(self.catalog.by_category()))
    }

    /// Lists the tokens accepted in response templates.
    #[must_use]
    pub fn variables(&self) -> OperationReport {
        let vocabulary = VariableSubstitutionEngine::vocabulary();
        OperationReport::succeeded(format!("{} variable(s) available", vocabulary.len()))
            .with("variables", json!(vocabulary))
    }

    /// Instantiates a blueprint and validates the resulting definition.
    ///
    /// The definition is returned, not stored.
    #[must_use]
    pub fn generate_command(
        &self,
        kind: &str,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> OperationReport {
        let parsed_kind = match CommandKind::try_from(kind) {
            Ok(parsed) => parsed,
            Err(err) => return OperationReport::failed(err.to_string()),
        };
        let definition = match self.catalog.generate(parsed_kind, name, params) {
            Ok(definition) => definition,
            Err(err) => return OperationReport::failed(err.to_string()),
        };
        match self.supervisor.validate_definition(&definition) {
            Ok(verdict) => OperationReport::succeeded(format!(
                "generated {parsed_kind} command from template {name}"
            ))
            .with("definition", json!(definition))
            .with("warnings", json!(verdict.warnings())),
            Err(err) => OperationReport::from(err).with("definition", json!(definition)),
        }
    }
}
