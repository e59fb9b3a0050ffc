//! Command definitions, validation and execution.
//!
//! This bounded context covers everything between a stored definition and a
//! reply: validating definitions, binding them into a per-instance
//! registry, resolving response templates and running Lua handlers.

pub mod domain;
pub mod ports;
pub mod script;
pub mod services;
pub mod validation;

#[cfg(test)]
mod tests;
