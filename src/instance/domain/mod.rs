//! Domain model for supervised bot instances.
//!
//! Bot configuration, the connection lifecycle and the runtime snapshot an
//! instance publishes. Nothing here touches threads or the network.

mod config;
mod error;
mod ids;
mod phase;
mod state;

pub use config::{BotConfig, BotConfigUpdate, BotToken, CommandPrefix, DeclaredStatus};
pub use error::{InstanceDomainError, ParseConnectionPhaseError, ParseDeclaredStatusError};
pub use ids::BotId;
pub use phase::ConnectionPhase;
pub use state::{CommandUsage, RuntimeInstanceState};
