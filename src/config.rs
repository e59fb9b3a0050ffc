//! Runtime configuration loaded from YAML.
//!
//! ```yaml
//! supervisor:
//!   stop_timeout_ms: 5000
//!   min_token_length: 10
//! validator:
//!   max_response_length: 2000
//!   reserved_triggers: [help, admin]
//! templates:
//!   - name: wave
//!     type: simple
//!     trigger: wave
//!     body: "*waves at $username*"
//! ```
//!
//! Every key is optional; missing keys take their defaults. A `templates`
//! list replaces the built-in catalog.

use crate::command::services::TemplateCatalog;
use crate::command::validation::{CommandValidator, ValidatorConfig, ValidatorConfigError};
use crate::instance::services::SupervisorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The YAML was malformed or had the wrong shape.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A validator pattern did not compile.
    #[error(transparent)]
    Validator(#[from] ValidatorConfigError),
}

/// Aggregate configuration for a supervisor process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Supervisor timeouts and limits.
    pub supervisor: SupervisorConfig,
    /// Definition validation rules.
    pub validator: ValidatorConfig,
    /// Blueprints offered through the control plane.
    pub templates: TemplateCatalog,
}

impl RuntimeConfig {
    /// Parses configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not valid YAML for
    /// this shape.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Reads and parses the YAML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, or
    /// [`ConfigError::Parse`] when its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = path.as_ref();
        let text = std::fs::read_to_string(file).map_err(|source| ConfigError::Read {
            path: file.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Builds the validator described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validator`] when a pattern does not compile.
    pub fn validator(&self) -> Result<Arc<CommandValidator>, ConfigError> {
        Ok(Arc::new(CommandValidator::new(self.validator.clone())?))
    }

    /// Returns the configured template catalog.
    #[must_use]
    pub fn catalog(&self) -> Arc<TemplateCatalog> {
        Arc::new(self.templates.clone())
    }
}
