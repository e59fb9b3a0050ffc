//! Unit tests for the command context.
//!
//! Covers the validator's acceptance properties and the registry's bind,
//! rebuild and execution behaviour.

mod support;
