//! Definition validation.
//!
//! The validator checks trigger and response rules for `simple` definitions
//! and structural rules plus a denylist for code-based definitions. It is a
//! gate against obvious mistakes and known-dangerous constructs, not an
//! execution sandbox.

mod config;
mod result;
mod rules;
mod service;

pub use config::{DenylistEntry, SourceMarkers, ValidatorConfig};
pub use result::{RejectionReason, ValidationResult, ValidationWarning};
pub use service::{CommandValidator, ValidatorConfigError};
