//! Bot configuration record.

use super::{BotId, InstanceDomainError, ParseDeclaredStatusError};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_PREFIX_LENGTH: usize = 5;
const DEFAULT_PREFIX: &str = "!";

/// Authentication token for the external bot platform.
///
/// `Debug` and `Display` never reveal the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotToken(String);

impl BotToken {
    /// Wraps a raw token.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw token for handing to the gateway.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns whether the trimmed token has at least `min_length`
    /// characters.
    #[must_use]
    pub fn meets_min_length(&self, min_length: usize) -> bool {
        let trimmed = self.0.trim();
        !trimmed.is_empty() && trimmed.chars().count() >= min_length
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("BotToken(***)")
    }
}

impl fmt::Display for BotToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("***")
    }
}

/// Validated command prefix.
///
/// One to five characters. A multi-character prefix needs at least one
/// symbol so that ordinary words are not mistaken for commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandPrefix(String);

impl CommandPrefix {
    /// Creates a validated prefix.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceDomainError::PrefixLength`] or
    /// [`InstanceDomainError::AlphanumericPrefix`] when the rules fail.
    pub fn new(value: impl Into<String>) -> Result<Self, InstanceDomainError> {
        let raw = value.into();
        let length = raw.chars().count();
        if length == 0 || length > MAX_PREFIX_LENGTH {
            return Err(InstanceDomainError::PrefixLength(length));
        }
        if length > 1 && raw.chars().all(char::is_alphanumeric) {
            return Err(InstanceDomainError::AlphanumericPrefix(raw));
        }
        Ok(Self(raw))
    }

    /// Returns the prefix text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CommandPrefix {
    fn default() -> Self {
        Self(DEFAULT_PREFIX.to_owned())
    }
}

impl fmt::Display for CommandPrefix {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl TryFrom<String> for CommandPrefix {
    type Error = InstanceDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommandPrefix> for String {
    fn from(value: CommandPrefix) -> Self {
        value.0
    }
}

/// Status last written to persistence.
///
/// A hint for operators and for restoring bots after a process restart;
/// the live instance map is authoritative at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredStatus {
    /// The bot was last started.
    Running,
    /// The bot was last stopped or never started.
    #[default]
    Stopped,
}

impl DeclaredStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for DeclaredStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DeclaredStatus {
    type Error = ParseDeclaredStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            _ => Err(ParseDeclaredStatusError(value.to_owned())),
        }
    }
}

/// Configuration of one bot as held by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot identifier.
    pub id: BotId,
    /// Platform token.
    pub token: BotToken,
    /// Command prefix.
    #[serde(default)]
    pub prefix: CommandPrefix,
    /// Custom status text shown by the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<String>,
    /// Status last written by the supervisor.
    #[serde(default, rename = "status")]
    pub declared_status: DeclaredStatus,
}

impl BotConfig {
    /// Creates a configuration with the default prefix and no presence.
    #[must_use]
    pub fn new(id: BotId, token: BotToken) -> Self {
        Self {
            id,
            token,
            prefix: CommandPrefix::default(),
            presence: None,
            declared_status: DeclaredStatus::Stopped,
        }
    }

    /// Sets the prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: CommandPrefix) -> Self {
        self.prefix = prefix;
        self
    }

    /// Sets the presence text.
    #[must_use]
    pub fn with_presence(mut self, presence: impl Into<String>) -> Self {
        self.presence = Some(presence.into());
        self
    }

    /// Merges `update` into this configuration, key by key.
    pub fn apply(&mut self, update: &BotConfigUpdate) {
        if let Some(status) = update.declared_status {
            self.declared_status = status;
        }
        if let Some(presence) = &update.presence {
            self.presence = Some(presence.clone());
        }
    }
}

/// Fields to merge into a stored [`BotConfig`].
///
/// Absent fields leave the stored value as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfigUpdate {
    /// New declared status.
    #[serde(default, rename = "status", skip_serializing_if = "Option::is_none")]
    pub declared_status: Option<DeclaredStatus>,
    /// New presence text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<String>,
}

impl BotConfigUpdate {
    /// Creates an update setting only the declared status.
    #[must_use]
    pub const fn status(status: DeclaredStatus) -> Self {
        Self {
            declared_status: Some(status),
            presence: None,
        }
    }

    /// Adds a presence value.
    #[must_use]
    pub fn with_presence(mut self, presence: Option<String>) -> Self {
        self.presence = presence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("!", true)]
    #[case("?!", true)]
    #[case("bot>", true)]
    #[case("", false)]
    #[case("toolong", false)]
    #[case("ab", false)]
    #[case("a", true)]
    fn prefix_rules(#[case] raw: &str, #[case] valid: bool) {
        assert_eq!(CommandPrefix::new(raw).is_ok(), valid);
    }

    #[rstest]
    fn token_never_prints_its_value() {
        let token = BotToken::new("super-secret-token");
        assert!(!format!("{token:?} {token}").contains("secret"));
    }

    #[rstest]
    #[case("short", 10, false)]
    #[case("   padded-but-short   ", 20, false)]
    #[case("0123456789", 10, true)]
    fn token_min_length_ignores_padding(
        #[case] raw: &str,
        #[case] min_length: usize,
        #[case] expected: bool,
    ) {
        assert_eq!(BotToken::new(raw).meets_min_length(min_length), expected);
    }

    #[rstest]
    fn update_merges_only_present_fields() {
        let id = BotId::new("helper").expect("valid id");
        let mut config = BotConfig::new(id, BotToken::new("0123456789")).with_presence("online");

        config.apply(&BotConfigUpdate::status(DeclaredStatus::Running));

        assert_eq!(config.declared_status, DeclaredStatus::Running);
        assert_eq!(config.presence.as_deref(), Some("online"));
    }
}
