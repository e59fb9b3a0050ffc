//! Live trigger-to-handler mapping for one bot instance.

use super::{BoundCommand, CommandHandler, TemplateHandler, VariableSubstitutionEngine};
use crate::command::domain::{CommandDefinition, CommandKind, HandlerScope, Trigger};
use crate::command::script::{ScriptError, ScriptHost};
use crate::command::validation::CommandValidator;
use serde::Serialize;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned while binding one definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The validator rejected the definition.
    #[error("definition '{label}' rejected: {reason}")]
    Rejected {
        /// Trigger or identifier of the definition.
        label: String,
        /// Validator reason.
        reason: String,
    },

    /// Loading the script failed.
    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Result of [`CommandRegistry::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Handlers were bound under these triggers.
    Installed(Vec<Trigger>),
    /// The definition is disabled and was not bound.
    Skipped,
}

/// A definition that could not be bound during a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDefinition {
    /// Trigger or identifier of the definition.
    pub label: String,
    /// Why binding failed.
    pub reason: String,
}

/// Summary of a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Triggers bound after the rebuild, prefix handlers first.
    pub installed: Vec<String>,
    /// Labels of disabled definitions.
    pub skipped: Vec<String>,
    /// Definitions that failed to bind.
    pub failed: Vec<FailedDefinition>,
}

impl RebuildReport {
    /// Returns whether every enabled definition was bound.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns the labels of failed definitions.
    #[must_use]
    pub fn failed_labels(&self) -> Vec<String> {
        self.failed.iter().map(|failed| failed.label.clone()).collect()
    }
}

enum Staged {
    Bound(Vec<BoundCommand>),
    Skipped,
}

#[derive(Default)]
struct Bindings {
    prefix: HashMap<Trigger, Rc<BoundCommand>>,
    slash: HashMap<Trigger, Rc<BoundCommand>>,
}

impl Bindings {
    fn insert(&mut self, command: BoundCommand) -> Trigger {
        let trigger = command.trigger().clone();
        let map = match command.scope() {
            HandlerScope::Prefix => &mut self.prefix,
            HandlerScope::Slash => &mut self.slash,
        };
        map.insert(trigger.clone(), Rc::new(command));
        trigger
    }

    fn installed(&self) -> Vec<String> {
        let mut prefix: Vec<String> = self.prefix.keys().map(ToString::to_string).collect();
        prefix.sort();
        let mut slash: Vec<String> = self.slash.keys().map(ToString::to_string).collect();
        slash.sort();
        prefix.extend(slash);
        prefix
    }
}

/// Holds the bound handlers of one bot instance.
///
/// Every code-based definition is loaded into a Lua VM of its own, so globals
/// and library tables changed by one script are invisible to the others.
/// Script handlers keep their VM alive and are confined to the thread that
/// created the registry. Handlers are handed out as `Rc` clones so that an
/// invocation in flight keeps its handler even when a rebuild replaces the
/// map.
pub struct CommandRegistry {
    validator: Arc<CommandValidator>,
    engine: Arc<VariableSubstitutionEngine>,
    bindings: Bindings,
}

impl CommandRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        validator: Arc<CommandValidator>,
        engine: Arc<VariableSubstitutionEngine>,
    ) -> Self {
        Self {
            validator,
            engine,
            bindings: Bindings::default(),
        }
    }

    /// Validates and binds one definition.
    ///
    /// Disabled definitions are skipped without validation so that they can
    /// be re-enabled later by a reload. A trigger that is already bound is
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when validation or script loading fails; the
    /// registry is unchanged in that case.
    pub fn add(&mut self, definition: &CommandDefinition) -> Result<AddOutcome, RegistryError> {
        match self.stage(definition)? {
            Staged::Skipped => Ok(AddOutcome::Skipped),
            Staged::Bound(commands) => Ok(AddOutcome::Installed(
                commands
                    .into_iter()
                    .map(|command| self.bindings.insert(command))
                    .collect(),
            )),
        }
    }

    /// Unbinds `trigger` from both surfaces.
    ///
    /// Returns whether anything was bound. Removing an unknown trigger is
    /// not an error.
    pub fn remove(&mut self, trigger: &str) -> bool {
        let from_prefix = self.bindings.prefix.remove(trigger).is_some();
        let from_slash = self.bindings.slash.remove(trigger).is_some();
        from_prefix || from_slash
    }

    /// Replaces every binding with the result of adding `definitions` in
    /// order.
    ///
    /// The new bindings are built beside the live ones and swapped in at the
    /// end, so no caller ever sees a partially rebuilt registry. Definitions
    /// that fail are reported and left out; the rest are installed. When two
    /// definitions bind the same trigger, the later one wins.
    pub fn rebuild(&mut self, definitions: &[CommandDefinition]) -> RebuildReport {
        let mut bindings = Bindings::default();
        let mut report = RebuildReport::default();

        for definition in definitions {
            match self.stage(definition) {
                Ok(Staged::Bound(commands)) => {
                    for command in commands {
                        bindings.insert(command);
                    }
                }
                Ok(Staged::Skipped) => report.skipped.push(definition.label().to_owned()),
                Err(err) => {
                    warn!(definition = %definition.label(), error = %err, "command definition failed to bind");
                    report.failed.push(FailedDefinition {
                        label: definition.label().to_owned(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        report.installed = bindings.installed();
        self.bindings = bindings;
        debug!(
            installed = report.installed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "command registry rebuilt"
        );
        report
    }

    /// Returns the handler bound to `trigger` on `scope`.
    #[must_use]
    pub fn get(&self, scope: HandlerScope, trigger: &str) -> Option<Rc<BoundCommand>> {
        let map = match scope {
            HandlerScope::Prefix => &self.bindings.prefix,
            HandlerScope::Slash => &self.bindings.slash,
        };
        map.get(trigger).cloned()
    }

    /// Returns whether `trigger` is bound on either surface.
    #[must_use]
    pub fn contains(&self, trigger: &str) -> bool {
        self.bindings.prefix.contains_key(trigger) || self.bindings.slash.contains_key(trigger)
    }

    /// Returns the number of prefix handlers.
    #[must_use]
    pub fn prefix_count(&self) -> usize {
        self.bindings.prefix.len()
    }

    /// Returns the number of slash handlers.
    #[must_use]
    pub fn slash_count(&self) -> usize {
        self.bindings.slash.len()
    }

    /// Returns the sorted names of slash handlers.
    #[must_use]
    pub fn slash_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.slash.keys().map(ToString::to_string).collect();
        names.sort();
        names
    }

    fn stage(&self, definition: &CommandDefinition) -> Result<Staged, RegistryError> {
        if !definition.enabled {
            return Ok(Staged::Skipped);
        }

        let verdict = self.validator.validate(definition);
        if !verdict.is_accepted() {
            return Err(RegistryError::Rejected {
                label: definition.label().to_owned(),
                reason: verdict.reason(),
            });
        }

        let commands = match definition.kind {
            CommandKind::Simple => vec![self.bind_template(definition)?],
            CommandKind::CodeBased | CommandKind::SlashCodeBased => ScriptHost::new()?
                .load(definition, self.validator.config().max_trigger_length)?
                .into_iter()
                .map(|registration| {
                    BoundCommand::new(
                        registration.trigger,
                        definition.id.clone(),
                        registration.scope,
                        registration
                            .description
                            .unwrap_or_else(|| definition.description.clone()),
                        CommandHandler::Script(registration.function),
                    )
                })
                .collect(),
        };
        Ok(Staged::Bound(commands))
    }

    fn bind_template(&self, definition: &CommandDefinition) -> Result<BoundCommand, RegistryError> {
        let trigger = Trigger::with_max_length(
            definition.trigger.clone(),
            self.validator.config().max_trigger_length,
        )
        .map_err(|err| RegistryError::Rejected {
            label: definition.label().to_owned(),
            reason: err.to_string(),
        })?;
        let templates = definition
            .response_templates()
            .into_iter()
            .map(str::to_owned)
            .collect();
        Ok(BoundCommand::new(
            trigger,
            definition.id.clone(),
            HandlerScope::Prefix,
            definition.description.clone(),
            CommandHandler::Template(TemplateHandler::new(templates, Arc::clone(&self.engine))),
        ))
    }
}
