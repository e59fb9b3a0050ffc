//! Unit tests for the instance context.
//!
//! Covers listener fan-out and the scriptable in-memory gateway. End-to-end
//! supervision is exercised by the integration tests.

mod notifier_tests;
