//! Per-invocation execution context.

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User who sent an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    /// Platform user identifier.
    pub id: String,
    /// Account name.
    pub name: String,
    /// Name shown in the originating group, if different.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserRef {
    /// Creates a user reference without display name or avatar.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            display_name: None,
            avatar_url: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Returns the display name, falling back to the account name.
    #[must_use]
    pub fn shown_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Returns the platform mention markup for this user.
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Group (server/guild) an invocation originated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    /// Platform group identifier.
    pub id: String,
    /// Group name.
    pub name: String,
    /// Member count captured when the snapshot was taken.
    pub member_count: u64,
    /// Icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl GroupRef {
    /// Creates a group reference without an icon.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, member_count: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            member_count,
            icon_url: None,
        }
    }
}

/// Channel an invocation originated from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    /// Platform channel identifier.
    pub id: String,
    /// Channel name; absent for direct messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelRef {
    /// Creates a named group channel.
    #[must_use]
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }

    /// Creates a direct-message channel.
    #[must_use]
    pub fn direct(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Returns the platform mention markup for this channel.
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// Identity of the connected bot account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    /// Platform user identifier of the bot account.
    pub id: String,
    /// Bot account name.
    pub name: String,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl BotIdentity {
    /// Creates a bot identity without an avatar.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar_url: None,
        }
    }

    /// Returns the platform mention markup for the bot.
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Record passed to substitution and to script handlers for one invocation.
///
/// Created fresh per inbound command event and discarded once the handler
/// finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Invocation identifier, used for log correlation.
    pub invocation_id: Uuid,
    /// Invoking user.
    pub user: UserRef,
    /// Originating group; `None` for direct messages.
    pub group: Option<GroupRef>,
    /// Originating channel.
    pub channel: ChannelRef,
    /// Connected bot identity.
    pub bot: BotIdentity,
    /// Prefix configured for the bot.
    pub prefix: String,
    /// Trigger that matched.
    pub trigger: String,
    /// Whitespace-separated arguments following the trigger.
    pub args: Vec<String>,
    /// Invocation timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Parameter object describing where an invocation came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOrigin {
    /// Invoking user.
    pub user: UserRef,
    /// Originating group; `None` for direct messages.
    pub group: Option<GroupRef>,
    /// Originating channel.
    pub channel: ChannelRef,
}

impl ExecutionContext {
    /// Creates a context for one invocation, stamped by `clock`.
    #[must_use]
    pub fn new(
        origin: InvocationOrigin,
        bot: BotIdentity,
        prefix: impl Into<String>,
        trigger: impl Into<String>,
        args: Vec<String>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            user: origin.user,
            group: origin.group,
            channel: origin.channel,
            bot,
            prefix: prefix.into(),
            trigger: trigger.into(),
            args,
            timestamp: clock.utc(),
        }
    }

    /// Returns all arguments joined by single spaces.
    #[must_use]
    pub fn raw_args(&self) -> String {
        self.args.join(" ")
    }

    /// Returns the argument at 1-based `position`, if present.
    #[must_use]
    pub fn arg(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|index| self.args.get(index))
            .map(String::as_str)
    }

    /// Returns whether the invocation came from a direct message.
    #[must_use]
    pub const fn is_direct_message(&self) -> bool {
        self.group.is_none()
    }
}
