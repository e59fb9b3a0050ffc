//! In-memory adapters for instance ports.

mod store;

pub use store::InMemoryBotStore;
