//! Connection lifecycle of a bot instance.

use super::ParseConnectionPhaseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a bot instance's connection lifecycle.
///
/// ```text
/// Created -> Connecting -> Ready -> (Disconnected <-> Reconnecting) -> Stopping -> Stopped
///                  \          \
///                   +-> Failed +-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// Instance exists but has not started connecting.
    Created,
    /// Handshake in progress.
    Connecting,
    /// Connected and dispatching commands.
    Ready,
    /// Connection dropped; a reconnect is pending.
    Disconnected,
    /// Reconnect in progress.
    Reconnecting,
    /// Graceful shutdown in progress.
    Stopping,
    /// Shut down.
    Stopped,
    /// Gave up after an unrecoverable error.
    Failed,
}

impl ConnectionPhase {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Returns whether the phase is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// Returns whether a command reload may be applied in this phase.
    #[must_use]
    pub const fn accepts_reload(self) -> bool {
        matches!(self, Self::Ready | Self::Disconnected | Self::Reconnecting)
    }

    /// Returns whether the instance counts as running for control
    /// operations.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Connecting | Self::Stopping)
                | (Self::Connecting, Self::Ready | Self::Failed | Self::Stopping)
                | (Self::Ready, Self::Disconnected | Self::Failed | Self::Stopping)
                | (Self::Disconnected, Self::Reconnecting | Self::Stopping)
                | (
                    Self::Reconnecting,
                    Self::Ready | Self::Disconnected | Self::Stopping
                )
                | (Self::Stopping, Self::Stopped)
        )
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ConnectionPhase {
    type Error = ParseConnectionPhaseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "created" => Ok(Self::Created),
            "connecting" => Ok(Self::Connecting),
            "ready" => Ok(Self::Ready),
            "disconnected" => Ok(Self::Disconnected),
            "reconnecting" => Ok(Self::Reconnecting),
            "stopping" => Ok(Self::Stopping),
            "stopped" => Ok(Self::Stopped),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseConnectionPhaseError(value.to_owned())),
        }
    }
}
