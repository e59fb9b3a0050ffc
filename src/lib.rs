//! Botvisor: supervision and hot reload for many chat bots in one process.
//!
//! This crate runs independent, long-lived bot connections side by side,
//! each with its own command set that can be validated, installed and
//! swapped at runtime without dropping the connection.
//!
//! # Architecture
//!
//! Botvisor follows hexagonal architecture principles:
//!
//! - **Domain**: Pure types and invariants with no infrastructure
//!   dependencies
//! - **Ports**: Trait interfaces for the bot platform, persistence and
//!   lifecycle listeners
//! - **Adapters**: In-memory implementations of those ports
//! - **Services**: Validation, registries, the per-instance event loop and
//!   the supervisor
//!
//! # Modules
//!
//! - [`command`]: Command definitions, validation, substitution and Lua
//!   handlers
//! - [`instance`]: Bot instances, their lifecycle and supervision
//! - [`config`]: YAML runtime configuration
//! - [`telemetry`]: Tracing setup

pub mod command;
pub mod config;
pub mod instance;
pub mod telemetry;
