//! Bound command handlers.

use super::VariableSubstitutionEngine;
use crate::command::domain::{ExecutionContext, HandlerScope, Trigger};
use crate::command::ports::{ReplyError, ReplySink};
use crate::command::script::{ScriptError, ScriptFunction};
use rand::seq::IndexedRandom;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while running a bound handler.
#[derive(Debug, Clone, Error)]
pub enum CommandExecutionError {
    /// The reply could not be delivered.
    #[error(transparent)]
    Reply(#[from] ReplyError),

    /// The script handler raised.
    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Response templates bound from a `simple` definition.
#[derive(Debug, Clone)]
pub struct TemplateHandler {
    templates: Vec<String>,
    engine: Arc<VariableSubstitutionEngine>,
}

impl TemplateHandler {
    /// Creates a handler choosing uniformly among `templates`.
    #[must_use]
    pub const fn new(templates: Vec<String>, engine: Arc<VariableSubstitutionEngine>) -> Self {
        Self { templates, engine }
    }

    /// Picks a template and resolves it against `context`.
    #[must_use]
    pub fn render(&self, context: &ExecutionContext) -> String {
        self.templates
            .choose(&mut rand::rng())
            .map(|template| self.engine.resolve(template, context))
            .unwrap_or_default()
    }
}

/// Behaviour behind a bound trigger.
#[derive(Debug, Clone)]
pub enum CommandHandler {
    /// Template resolved through variable substitution.
    Template(TemplateHandler),
    /// Lua function registered by a code-based definition.
    Script(ScriptFunction),
}

/// A handler installed in a registry under one trigger.
#[derive(Debug, Clone)]
pub struct BoundCommand {
    trigger: Trigger,
    definition_id: String,
    scope: HandlerScope,
    description: String,
    handler: CommandHandler,
}

impl BoundCommand {
    /// Creates a bound command.
    #[must_use]
    pub const fn new(
        trigger: Trigger,
        definition_id: String,
        scope: HandlerScope,
        description: String,
        handler: CommandHandler,
    ) -> Self {
        Self {
            trigger,
            definition_id,
            scope,
            description,
            handler,
        }
    }

    /// Returns the trigger.
    #[must_use]
    pub const fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Returns the identifier of the definition that produced the handler.
    #[must_use]
    pub fn definition_id(&self) -> &str {
        &self.definition_id
    }

    /// Returns the invocation surface.
    #[must_use]
    pub const fn scope(&self) -> HandlerScope {
        self.scope
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Runs the handler and delivers its output through `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandExecutionError`] when the script raises or the reply
    /// cannot be delivered.
    pub async fn execute(
        &self,
        context: &ExecutionContext,
        sink: &Arc<dyn ReplySink>,
    ) -> Result<(), CommandExecutionError> {
        let output = match &self.handler {
            CommandHandler::Template(template) => Some(template.render(context)),
            CommandHandler::Script(function) => function.invoke(context, sink).await?,
        };
        if let Some(text) = output.filter(|text| !text.is_empty()) {
            sink.send(&context.channel, &text).await?;
        }
        Ok(())
    }
}
