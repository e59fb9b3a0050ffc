//! Reusable command blueprints.

use super::CommandKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const FALLBACK_CATEGORY: &str = "other";

/// A named blueprint that can be turned into a [`super::CommandDefinition`].
///
/// `body` is the response template for `simple` blueprints and the script
/// for code-based ones. `{name}` placeholders in the trigger, body,
/// variations and description are filled from caller parameters, falling
/// back to `defaults`; placeholders with neither are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    /// Catalog key, unique within one kind.
    pub name: String,
    /// Kind of definition the blueprint produces.
    #[serde(rename = "type")]
    pub kind: CommandKind,
    /// Trigger for `simple` blueprints; empty for scripts.
    #[serde(default)]
    pub trigger: String,
    /// Response template or script body.
    pub body: String,
    /// Alternative responses for `simple` blueprints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variations: Vec<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Grouping shown to operators.
    #[serde(default = "fallback_category")]
    pub category: String,
    /// Placeholder values used when the caller supplies none.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, String>,
}

fn fallback_category() -> String {
    FALLBACK_CATEGORY.to_owned()
}

impl CommandTemplate {
    /// Creates a `simple` blueprint.
    #[must_use]
    pub fn simple(
        name: impl Into<String>,
        trigger: impl Into<String>,
        body: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: CommandKind::Simple,
            trigger: trigger.into(),
            body: body.into(),
            variations: Vec::new(),
            description: String::new(),
            category: category.into(),
            defaults: BTreeMap::new(),
        }
    }

    /// Creates a code-based blueprint of `kind`.
    #[must_use]
    pub fn script(
        name: impl Into<String>,
        kind: CommandKind,
        body: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            trigger: String::new(),
            body: body.into(),
            variations: Vec::new(),
            description: String::new(),
            category: category.into(),
            defaults: BTreeMap::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the alternative responses.
    #[must_use]
    pub fn with_variations(mut self, variations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.variations = variations.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a default placeholder value.
    #[must_use]
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Returns `params` layered over the blueprint defaults.
    #[must_use]
    pub fn merged_params(&self, params: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = self.defaults.clone();
        merged.extend(params.iter().map(|(key, value)| (key.clone(), value.clone())));
        merged
    }
}

/// Replaces every `{key}` in `text` with its value from `params`.
#[must_use]
pub fn fill_placeholders(text: &str, params: &BTreeMap<String, String>) -> String {
    params.iter().fold(text.to_owned(), |filled, (key, value)| {
        filled.replace(&format!("{{{key}}}"), value)
    })
}
