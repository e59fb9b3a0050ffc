//! Command validator service.

use super::{
    ValidationResult, ValidatorConfig,
    rules::{self, CompiledPatterns},
};
use crate::command::domain::{CommandDefinition, CommandKind};
use regex::Regex;
use thiserror::Error;

/// Error returned when a validator configuration contains a bad pattern.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid validator pattern '{name}': {reason}")]
pub struct ValidatorConfigError {
    /// Denylist label or marker name.
    pub name: String,
    /// Regex compilation error.
    pub reason: String,
}

/// Validates command definitions before they are installed.
///
/// Validation is textual and structural only. Passing it does not make a
/// script safe to run: the denylist catches known constructs, and nothing
/// here bounds CPU, memory or logic abuse by an accepted script.
///
/// # Examples
///
/// ```
/// use botvisor::command::domain::CommandDefinition;
/// use botvisor::command::validation::{CommandValidator, ValidatorConfig};
///
/// let validator = CommandValidator::new(ValidatorConfig::default()).expect("default config");
/// let result = validator.validate(&CommandDefinition::simple("ping", "pong"));
/// assert!(result.is_accepted());
/// ```
#[derive(Debug, Clone)]
pub struct CommandValidator {
    config: ValidatorConfig,
    patterns: CompiledPatterns,
}

impl CommandValidator {
    /// Creates a validator, compiling the configured patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorConfigError`] when a denylist or marker pattern is
    /// not a valid regular expression.
    pub fn new(config: ValidatorConfig) -> Result<Self, ValidatorConfigError> {
        let denylist = config
            .denylist
            .iter()
            .map(|entry| Ok((entry.label.clone(), compile(&entry.label, &entry.pattern)?)))
            .collect::<Result<Vec<_>, ValidatorConfigError>>()?;
        let patterns = CompiledPatterns {
            denylist,
            entry_point: compile("entry_point", &config.markers.entry_point)?,
            awaited_call: compile("awaited_call", &config.markers.awaited_call)?,
            reply_call: compile("reply_call", &config.markers.reply_call)?,
            error_handling: compile("error_handling", &config.markers.error_handling)?,
        };
        Ok(Self { config, patterns })
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validates a definition, collecting every rejection and warning.
    #[must_use]
    pub fn validate(&self, definition: &CommandDefinition) -> ValidationResult {
        let mut warnings = Vec::new();
        let rejections = match definition.kind {
            CommandKind::Simple => {
                let mut found = rules::validate_trigger(definition, &self.config, &mut warnings);
                found.extend(rules::validate_responses(definition, &self.config));
                found
            }
            CommandKind::CodeBased | CommandKind::SlashCodeBased => rules::validate_source(
                definition,
                &self.config,
                &self.patterns,
                &mut warnings,
            ),
        };
        ValidationResult::new(rejections, warnings)
    }
}

fn compile(name: &str, pattern: &str) -> Result<Regex, ValidatorConfigError> {
    Regex::new(pattern).map_err(|err| ValidatorConfigError {
        name: name.to_owned(),
        reason: err.to_string(),
    })
}
