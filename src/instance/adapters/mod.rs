//! Adapter implementations for instance ports.

mod gateway;
pub mod memory;

pub use gateway::{InMemoryBotGateway, SentReply};
