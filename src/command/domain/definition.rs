//! Declarative command definitions consumed by the registry.

use super::ParseCommandKindError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Behaviour family of a command definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    /// Response template resolved through variable substitution.
    Simple,
    /// Script registering one or more prefix command handlers.
    #[serde(alias = "advanced")]
    CodeBased,
    /// Script registering one or more slash command handlers.
    #[serde(alias = "slash")]
    SlashCodeBased,
}

impl CommandKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::CodeBased => "code-based",
            Self::SlashCodeBased => "slash-code-based",
        }
    }

    /// Returns whether the kind carries executable source.
    #[must_use]
    pub const fn is_code_based(self) -> bool {
        matches!(self, Self::CodeBased | Self::SlashCodeBased)
    }

    /// Returns the invocation surface handlers of this kind bind to.
    #[must_use]
    pub const fn scope(self) -> HandlerScope {
        match self {
            Self::SlashCodeBased => HandlerScope::Slash,
            Self::Simple | Self::CodeBased => HandlerScope::Prefix,
        }
    }
}

/// Invocation surface a bound handler answers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerScope {
    /// Message starting with the bot prefix.
    Prefix,
    /// Platform slash-command interaction.
    Slash,
}

impl fmt::Display for HandlerScope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Prefix => "prefix",
            Self::Slash => "slash",
        })
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for CommandKind {
    type Error = ParseCommandKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "simple" => Ok(Self::Simple),
            "code-based" | "advanced" => Ok(Self::CodeBased),
            "slash-code-based" | "slash" => Ok(Self::SlashCodeBased),
            _ => Err(ParseCommandKindError(value.to_owned())),
        }
    }
}

/// One command as stored by the persistence collaborator.
///
/// `simple` definitions carry `response` (and optional `variations`);
/// code-based kinds carry `source`. Field presence is checked by the
/// validator, not by construction, so that stored records with missing
/// fields can still be loaded and reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    /// Identifier, unique within one bot.
    pub id: String,
    /// Behaviour family.
    #[serde(rename = "type")]
    pub kind: CommandKind,
    /// Text that invokes the command after the prefix.
    #[serde(default)]
    pub trigger: String,
    /// Response template for `simple` definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Alternative response templates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variations: Vec<String>,
    /// Whether invocations pick randomly among the response and variations.
    #[serde(default)]
    pub use_variations: bool,
    /// Script body for code-based kinds.
    #[serde(default, rename = "code", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Disabled definitions are skipped at install time.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

const fn enabled_by_default() -> bool {
    true
}

impl CommandDefinition {
    /// Creates an enabled `simple` definition whose identifier is the trigger.
    #[must_use]
    pub fn simple(trigger: impl Into<String>, response: impl Into<String>) -> Self {
        let trigger_text = trigger.into();
        Self {
            id: trigger_text.clone(),
            kind: CommandKind::Simple,
            trigger: trigger_text,
            response: Some(response.into()),
            variations: Vec::new(),
            use_variations: false,
            source: None,
            enabled: true,
            description: String::new(),
        }
    }

    /// Creates an enabled code-based definition.
    #[must_use]
    pub fn code(id: impl Into<String>, kind: CommandKind, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            trigger: String::new(),
            response: None,
            variations: Vec::new(),
            use_variations: false,
            source: Some(source.into()),
            enabled: true,
            description: String::new(),
        }
    }

    /// Replaces the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Adds response variations and turns random selection on.
    #[must_use]
    pub fn with_variations(mut self, variations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.variations = variations.into_iter().map(Into::into).collect();
        self.use_variations = true;
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the label used when reporting this definition.
    ///
    /// Falls back to the identifier when the trigger is empty, which is the
    /// usual case for code-based definitions.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.trigger.trim().is_empty() {
            &self.id
        } else {
            &self.trigger
        }
    }

    /// Returns every response template a `simple` definition may use.
    #[must_use]
    pub fn response_templates(&self) -> Vec<&str> {
        let mut templates: Vec<&str> = self.response.iter().map(String::as_str).collect();
        if self.use_variations {
            templates.extend(self.variations.iter().map(String::as_str));
        }
        templates
    }
}
