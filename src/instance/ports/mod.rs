//! Port interfaces for the instance context.

pub mod gateway;
pub mod listener;
pub mod store;

pub use gateway::{
    BotGateway, ConnectRequest, GatewayError, GatewayEvent, GatewayResult, GatewaySession,
    InboundMessage, SlashInvocation,
};
pub use listener::{LifecycleEvent, LifecycleListener, ListenerError};
pub use store::{BotStore, BotStoreError, BotStoreResult};
