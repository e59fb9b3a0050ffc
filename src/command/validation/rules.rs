//! Individual validation rules.
//!
//! Each rule inspects one aspect of a definition and returns the reasons it
//! found. Rules do not short-circuit each other; the service collects every
//! finding.

use super::{RejectionReason, ValidationWarning, ValidatorConfig};
use crate::command::domain::{CommandDefinition, CommandKind, Trigger};
use crate::command::script;
use regex::Regex;

/// Compiled form of the denylist and the structural marker patterns.
#[derive(Debug, Clone)]
pub(super) struct CompiledPatterns {
    pub(super) denylist: Vec<(String, Regex)>,
    pub(super) entry_point: Regex,
    pub(super) awaited_call: Regex,
    pub(super) reply_call: Regex,
    pub(super) error_handling: Regex,
}

/// Validates the trigger of a `simple` definition.
pub(super) fn validate_trigger(
    definition: &CommandDefinition,
    config: &ValidatorConfig,
    warnings: &mut Vec<ValidationWarning>,
) -> Vec<RejectionReason> {
    match Trigger::with_max_length(definition.trigger.clone(), config.max_trigger_length) {
        Ok(trigger) => {
            if config.is_reserved(trigger.as_str()) {
                warnings.push(ValidationWarning::ReservedTrigger(trigger.into()));
            }
            Vec::new()
        }
        Err(err) => vec![RejectionReason::Trigger(err)],
    }
}

/// Validates the response template and any variations.
pub(super) fn validate_responses(
    definition: &CommandDefinition,
    config: &ValidatorConfig,
) -> Vec<RejectionReason> {
    let Some(response) = definition.response.as_deref() else {
        return vec![RejectionReason::MissingResponse];
    };

    let mut rejections = Vec::new();
    let variations = definition
        .use_variations
        .then_some(definition.variations.as_slice())
        .unwrap_or_default();
    for template in std::iter::once(response).chain(variations.iter().map(String::as_str)) {
        if let Some(reason) = check_template(template, config.max_response_length)
            && !rejections.contains(&reason)
        {
            rejections.push(reason);
        }
    }
    rejections
}

fn check_template(template: &str, max_length: usize) -> Option<RejectionReason> {
    if template.trim().is_empty() {
        return Some(RejectionReason::EmptyResponse);
    }
    let length = template.chars().count();
    (length > max_length).then_some(RejectionReason::ResponseTooLong { length, max_length })
}

/// Validates the script of a code-based definition.
pub(super) fn validate_source(
    definition: &CommandDefinition,
    config: &ValidatorConfig,
    patterns: &CompiledPatterns,
    warnings: &mut Vec<ValidationWarning>,
) -> Vec<RejectionReason> {
    let source = definition.source.as_deref().unwrap_or_default();
    if source.trim().is_empty() {
        return vec![RejectionReason::EmptySource];
    }

    let length = source.chars().count();
    if length > config.max_source_length {
        return vec![RejectionReason::SourceTooLong {
            length,
            max_length: config.max_source_length,
        }];
    }

    let mut rejections = Vec::new();
    let marker = registration_marker(definition.kind, config);
    if !source.contains(marker) {
        rejections.push(RejectionReason::MissingRegistrationMarker {
            marker: marker.to_owned(),
        });
    }
    if !patterns.entry_point.is_match(source) {
        rejections.push(RejectionReason::MissingEntryPoint);
    }
    if let Err(err) = script::check_syntax(source) {
        rejections.push(RejectionReason::Syntax(err.to_string()));
    }
    rejections.extend(scan_denylist(source, patterns));

    collect_style_warnings(source, patterns, warnings);
    rejections
}

fn registration_marker(kind: CommandKind, config: &ValidatorConfig) -> &str {
    match kind {
        CommandKind::SlashCodeBased => &config.markers.slash_registration,
        CommandKind::CodeBased | CommandKind::Simple => &config.markers.command_registration,
    }
}

fn scan_denylist(source: &str, patterns: &CompiledPatterns) -> Vec<RejectionReason> {
    patterns
        .denylist
        .iter()
        .filter_map(|(label, pattern)| {
            pattern.find(source).map(|found| RejectionReason::Denylisted {
                label: label.clone(),
                fragment: found.as_str().to_owned(),
            })
        })
        .collect()
}

fn collect_style_warnings(
    source: &str,
    patterns: &CompiledPatterns,
    warnings: &mut Vec<ValidationWarning>,
) {
    if !patterns.awaited_call.is_match(source) {
        warnings.push(ValidationWarning::NoAwaitedCall);
    }
    if !patterns.reply_call.is_match(source) {
        warnings.push(ValidationWarning::NoReply);
    }
    if !patterns.error_handling.is_match(source) {
        warnings.push(ValidationWarning::NoErrorHandling);
    }
}
