//! Supervised bot instances.
//!
//! This bounded context runs each bot connection on its own thread and
//! event loop, publishes its runtime state, and lets the control plane
//! start, stop, restart and hot-reload instances through bounded waits.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
