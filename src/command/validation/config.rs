//! Validator configuration.

use crate::command::domain::Trigger;
use serde::{Deserialize, Serialize};

/// One denylisted construct: a regular expression over the source text and
/// the label reported when it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenylistEntry {
    /// Human-readable construct name used in rejection reasons.
    pub label: String,
    /// Regular expression matched against the raw source.
    pub pattern: String,
}

impl DenylistEntry {
    /// Creates a denylist entry.
    #[must_use]
    pub fn new(label: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pattern: pattern.into(),
        }
    }
}

/// Markers a code-based source must contain to be installable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMarkers {
    /// Registration call for `code-based` definitions.
    pub command_registration: String,
    /// Registration call for `slash-code-based` definitions.
    pub slash_registration: String,
    /// Pattern recognising a handler that receives the invocation context.
    pub entry_point: String,
    /// Pattern recognising a suspending host call.
    pub awaited_call: String,
    /// Pattern recognising a user-visible reply.
    pub reply_call: String,
    /// Pattern recognising protected calls.
    pub error_handling: String,
}

impl Default for SourceMarkers {
    fn default() -> Self {
        Self {
            command_registration: "bot.command(".to_owned(),
            slash_registration: "bot.slash_command(".to_owned(),
            entry_point: r"function\s*[A-Za-z0-9_.:]*\s*\(\s*ctx\b".to_owned(),
            awaited_call: r"ctx\s*:\s*(reply|send|sleep)\s*\(".to_owned(),
            reply_call: r"ctx\s*:\s*(reply|send)\s*\(|\breturn\s+[^\s]".to_owned(),
            error_handling: r"\bx?pcall\s*\(".to_owned(),
        }
    }
}

/// Limits and tables used by [`super::CommandValidator`].
///
/// Passed explicitly at construction; there is no process-wide default
/// table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Maximum trigger length in characters.
    pub max_trigger_length: usize,
    /// Maximum response template length in characters.
    pub max_response_length: usize,
    /// Maximum script length in characters.
    pub max_source_length: usize,
    /// Triggers accepted with a warning.
    pub reserved_triggers: Vec<String>,
    /// Constructs that reject a script outright.
    pub denylist: Vec<DenylistEntry>,
    /// Structural markers for code-based kinds.
    pub markers: SourceMarkers,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_trigger_length: Trigger::DEFAULT_MAX_LENGTH,
            max_response_length: 2000,
            max_source_length: 20_000,
            reserved_triggers: vec!["help".to_owned(), "admin".to_owned()],
            denylist: default_denylist(),
            markers: SourceMarkers::default(),
        }
    }
}

impl ValidatorConfig {
    /// Returns whether `trigger` is reserved.
    #[must_use]
    pub fn is_reserved(&self, trigger: &str) -> bool {
        self.reserved_triggers
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(trigger))
    }
}

fn default_denylist() -> Vec<DenylistEntry> {
    vec![
        DenylistEntry::new("dynamic module import", r"\brequire\b"),
        DenylistEntry::new(
            "dynamic code evaluation",
            r"\b(load|loadstring|loadfile|dofile)\s*[\(\x22'\[{]",
        ),
        DenylistEntry::new("module loader access", r"\bpackage\s*[.\[]"),
        DenylistEntry::new("file access", r"\bio\s*[.\[]"),
        DenylistEntry::new(
            "process invocation",
            r"\bos\s*\.\s*(execute|remove|rename|exit|getenv|tmpname)\b",
        ),
        DenylistEntry::new("debugger and introspection", r"\bdebug\s*[.\[]"),
        DenylistEntry::new(
            "reflection into internals",
            r"\b(_G|_ENV|getmetatable|setmetatable|rawget|rawset|rawequal|rawlen)\b",
        ),
        DenylistEntry::new("garbage collector control", r"\bcollectgarbage\b"),
        DenylistEntry::new("scheduler internals", r"\bcoroutine\s*[.\[]"),
        DenylistEntry::new("bytecode dump", r"\bstring\s*\.\s*dump\b"),
    ]
}
