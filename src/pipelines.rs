//! Validation pipelines for outbound event data.
//!
//! Each pipeline runs the same stages: normalize the raw input, walk an
//! ordered chain of validation steps, report every produced error to the
//! shared [`ValidationResultStack`], and log the outcome. The first step that
//! drops short-circuits the rest of the chain.

use crate::config::ValidationConfig;
use crate::events::PropertyValue;
use crate::validation::{
    DropReason, ErrorCode, Modification, NormalizationResult, ValidationError, ValidationOutcome,
    ValidationResultStack,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Deterministic cleanup of one raw string: strip disallowed characters, trim
/// surrounding whitespace, truncate to `max_length` characters.
///
/// Idempotent: re-running on an already-clean value applies no further
/// modification.
pub fn normalize_string(
    raw: &str,
    chars_not_allowed: &[char],
    max_length: usize,
) -> NormalizationResult {
    let mut modifications = BTreeSet::new();

    let stripped: String = if raw.chars().any(|c| chars_not_allowed.contains(&c)) {
        modifications.insert(Modification::CharactersRemoved);
        raw.chars()
            .filter(|c| !chars_not_allowed.contains(c))
            .collect()
    } else {
        raw.to_string()
    };

    let trimmed = stripped.trim();
    if trimmed.len() != stripped.len() {
        modifications.insert(Modification::Trimmed);
    }
    let mut cleaned = trimmed.to_string();

    if cleaned.chars().count() > max_length {
        modifications.insert(Modification::Truncated);
        cleaned = cleaned.chars().take(max_length).collect();
        // Truncation may expose trailing whitespace; cleaning it here keeps
        // normalization idempotent.
        cleaned.truncate(cleaned.trim_end().len());
    }

    NormalizationResult {
        original: raw.to_string(),
        cleaned,
        modifications,
    }
}

enum StepResult {
    Pass,
    Warn(Vec<ValidationError>),
    Drop(ValidationError, DropReason),
}

type Step = fn(&NormalizationResult, &ValidationConfig) -> StepResult;

fn run_steps(
    steps: &[Step],
    norm: &NormalizationResult,
    config: &ValidationConfig,
) -> ValidationOutcome {
    let mut errors = Vec::new();
    for step in steps {
        match step(norm, config) {
            StepResult::Pass => {}
            StepResult::Warn(step_errors) => errors.extend(step_errors),
            StepResult::Drop(error, reason) => {
                errors.push(error);
                return ValidationOutcome::Drop { errors, reason };
            }
        }
    }
    if errors.is_empty() {
        ValidationOutcome::Success
    } else {
        ValidationOutcome::Warning { errors }
    }
}

fn name_present(norm: &NormalizationResult, _config: &ValidationConfig) -> StepResult {
    if norm.original.trim().is_empty() {
        return StepResult::Drop(
            ValidationError::new(ErrorCode::EventNameNull, "Event name is null or empty"),
            DropReason::NullEventName,
        );
    }
    if norm.cleaned.is_empty() {
        return StepResult::Drop(
            ValidationError::new(
                ErrorCode::EventNameNull,
                "Event name became empty after cleaning",
            ),
            DropReason::NullEventName,
        );
    }
    StepResult::Pass
}

fn name_not_restricted(norm: &NormalizationResult, config: &ValidationConfig) -> StepResult {
    if config
        .restricted_event_names
        .iter()
        .any(|name| name.eq_ignore_ascii_case(&norm.cleaned))
    {
        return StepResult::Drop(
            ValidationError::new(
                ErrorCode::EventNameRestricted,
                format!("{} is a restricted system event name", norm.cleaned),
            ),
            DropReason::RestrictedEventName,
        );
    }
    StepResult::Pass
}

fn name_not_discarded(norm: &NormalizationResult, config: &ValidationConfig) -> StepResult {
    if config
        .discarded_event_names
        .iter()
        .any(|name| name.eq_ignore_ascii_case(&norm.cleaned))
    {
        return StepResult::Drop(
            ValidationError::new(
                ErrorCode::EventNameDiscarded,
                format!("{} is discarded by server configuration", norm.cleaned),
            ),
            DropReason::DiscardedEventName,
        );
    }
    StepResult::Pass
}

fn name_modifications(norm: &NormalizationResult, config: &ValidationConfig) -> StepResult {
    modification_warnings(norm, "event name", config.max_event_name_length)
}

fn key_present(norm: &NormalizationResult, _config: &ValidationConfig) -> StepResult {
    if norm.original.trim().is_empty() {
        return StepResult::Drop(
            ValidationError::new(ErrorCode::KeyNull, "Property key is null or empty"),
            DropReason::NullKey,
        );
    }
    if norm.cleaned.is_empty() {
        return StepResult::Drop(
            ValidationError::new(
                ErrorCode::KeyEmptyAfterCleaning,
                format!("Property key {} became empty after cleaning", norm.original),
            ),
            DropReason::EmptyKey,
        );
    }
    StepResult::Pass
}

fn key_not_restricted_multi_value(
    norm: &NormalizationResult,
    config: &ValidationConfig,
) -> StepResult {
    if config
        .restricted_multi_value_fields
        .iter()
        .any(|field| field.eq_ignore_ascii_case(&norm.cleaned))
    {
        return StepResult::Drop(
            ValidationError::new(
                ErrorCode::RestrictedMultiValueKey,
                format!("{} may not carry multi-value properties", norm.cleaned),
            ),
            DropReason::RestrictedMultiValueKey,
        );
    }
    StepResult::Pass
}

fn key_modifications(norm: &NormalizationResult, config: &ValidationConfig) -> StepResult {
    modification_warnings(norm, "property key", config.max_key_length)
}

/// Trimming alone is silent; stripped characters and truncation surface as
/// warnings.
fn modification_warnings(norm: &NormalizationResult, kind: &str, max_length: usize) -> StepResult {
    let mut errors = Vec::new();
    if norm.has(Modification::CharactersRemoved) {
        errors.push(ValidationError::new(
            ErrorCode::InvalidCharacters,
            format!("Invalid characters removed from {kind} {}", norm.original),
        ));
    }
    if norm.has(Modification::Truncated) {
        errors.push(ValidationError::new(
            ErrorCode::Truncated,
            format!("{kind} truncated to {max_length} characters"),
        ));
    }
    if errors.is_empty() {
        StepResult::Pass
    } else {
        StepResult::Warn(errors)
    }
}

const NAME_STEPS: &[Step] = &[
    name_present,
    name_not_restricted,
    name_not_discarded,
    name_modifications,
];

const KEY_STEPS: &[Step] = &[key_present, key_modifications];

const MULTI_VALUE_KEY_STEPS: &[Step] = &[
    key_present,
    key_not_restricted_multi_value,
    key_modifications,
];

/// The cleaned value paired with the validation verdict for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult<T> {
    pub value: T,
    pub outcome: ValidationOutcome,
}

impl<T> PipelineResult<T> {
    pub fn is_dropped(&self) -> bool {
        self.outcome.is_drop()
    }
}

/// Normalizes and validates event names against the restricted and discarded
/// name lists.
pub struct EventNamePipeline {
    config: Arc<ValidationConfig>,
    stack: Arc<ValidationResultStack>,
}

impl EventNamePipeline {
    pub fn new(config: Arc<ValidationConfig>, stack: Arc<ValidationResultStack>) -> Self {
        Self { config, stack }
    }

    pub fn execute(&self, raw_name: &str) -> PipelineResult<String> {
        let norm = normalize_string(
            raw_name,
            &self.config.event_name_chars_not_allowed,
            self.config.max_event_name_length,
        );
        let outcome = run_steps(NAME_STEPS, &norm, &self.config);
        report_and_log("event name", &norm, &outcome, &self.stack);
        PipelineResult {
            value: norm.cleaned,
            outcome,
        }
    }
}

/// Normalizes and validates property keys. The multi-value variant appends
/// one extra rule to the base chain; there is no other difference.
pub struct PropertyKeyPipeline {
    config: Arc<ValidationConfig>,
    stack: Arc<ValidationResultStack>,
    steps: &'static [Step],
}

impl PropertyKeyPipeline {
    pub fn new(config: Arc<ValidationConfig>, stack: Arc<ValidationResultStack>) -> Self {
        Self {
            config,
            stack,
            steps: KEY_STEPS,
        }
    }

    /// Chain for keys of multi-value (list) properties: base steps plus the
    /// restricted-multi-value-field rule.
    pub fn for_multi_value(config: Arc<ValidationConfig>, stack: Arc<ValidationResultStack>) -> Self {
        Self {
            config,
            stack,
            steps: MULTI_VALUE_KEY_STEPS,
        }
    }

    pub fn execute(&self, raw_key: &str) -> PipelineResult<String> {
        let norm = normalize_string(
            raw_key,
            &self.config.key_chars_not_allowed,
            self.config.max_key_length,
        );
        let outcome = run_steps(self.steps, &norm, &self.config);
        report_and_log("property key", &norm, &outcome, &self.stack);
        PipelineResult {
            value: norm.cleaned,
            outcome,
        }
    }
}

/// Count check for charged-event items. Never drops; an oversized purchase
/// still goes through with a warning.
pub struct ChargedEventItemsPipeline {
    config: Arc<ValidationConfig>,
    stack: Arc<ValidationResultStack>,
}

impl ChargedEventItemsPipeline {
    pub fn new(config: Arc<ValidationConfig>, stack: Arc<ValidationResultStack>) -> Self {
        Self { config, stack }
    }

    pub fn execute(&self, items: &[HashMap<String, PropertyValue>]) -> PipelineResult<usize> {
        let outcome = if items.len() > self.config.max_charged_event_items {
            ValidationOutcome::Warning {
                errors: vec![ValidationError::new(
                    ErrorCode::ChargedEventTooManyItems,
                    format!(
                        "Charged event contains {} items, more than the {} allowed",
                        items.len(),
                        self.config.max_charged_event_items
                    ),
                )],
            }
        } else {
            ValidationOutcome::Success
        };

        if let ValidationOutcome::Warning { errors } = &outcome {
            self.stack.push_all(errors);
            debug!("Charged event items warning: {:?}", errors);
        }
        PipelineResult {
            value: items.len(),
            outcome,
        }
    }
}

fn report_and_log(
    kind: &str,
    norm: &NormalizationResult,
    outcome: &ValidationOutcome,
    stack: &ValidationResultStack,
) {
    match outcome {
        ValidationOutcome::Success => {}
        ValidationOutcome::Warning { errors } => {
            stack.push_all(errors);
            debug!("Validated {} {:?} with warnings: {:?}", kind, norm.original, errors);
        }
        ValidationOutcome::Drop { errors, reason } => {
            stack.push_all(errors);
            warn!("Dropped {} {:?}: {:?}", kind, norm.original, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Arc<ValidationConfig> {
        Arc::new(ValidationConfig::default())
    }

    fn stack() -> Arc<ValidationResultStack> {
        Arc::new(ValidationResultStack::new())
    }

    #[test]
    fn normalization_is_idempotent() {
        let chars = ['!', '#'];
        for raw in ["  Purchase!!", "plain", "  spaced out  ", "###", "a#b!c"] {
            let once = normalize_string(raw, &chars, 20);
            let twice = normalize_string(&once.cleaned, &chars, 20);
            assert_eq!(twice.cleaned, once.cleaned, "input {raw:?}");
            assert!(!twice.was_modified(), "input {raw:?}");
        }
    }

    #[test]
    fn modifications_are_all_recorded() {
        let norm = normalize_string("  Purchase!!", &['!'], 20);
        assert_eq!(norm.cleaned, "Purchase");
        assert!(norm.has(Modification::Trimmed));
        assert!(norm.has(Modification::CharactersRemoved));
        assert!(!norm.has(Modification::Truncated));
    }

    #[test]
    fn truncation_cannot_leave_trailing_whitespace() {
        let once = normalize_string("ab cd", &[], 3);
        assert_eq!(once.cleaned, "ab");
        assert!(once.has(Modification::Truncated));
        let twice = normalize_string(&once.cleaned, &[], 3);
        assert!(!twice.was_modified());
    }

    #[test]
    fn stripped_name_warns_once() {
        let config = Arc::new(
            ValidationConfig::builder()
                .event_name_chars_not_allowed(vec!['!'])
                .max_event_name_length(20)
                .build(),
        );
        let stack = stack();
        let pipeline = EventNamePipeline::new(config, Arc::clone(&stack));

        let result = pipeline.execute("  Purchase!!");
        assert_eq!(result.value, "Purchase");
        let errors = result.outcome.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::InvalidCharacters);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn empty_name_short_circuits_with_exactly_one_error() {
        let pipeline = EventNamePipeline::new(config(), stack());
        let result = pipeline.execute("   ");
        match result.outcome {
            ValidationOutcome::Drop { errors, reason } => {
                assert_eq!(reason, DropReason::NullEventName);
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].code, ErrorCode::EventNameNull);
            }
            other => panic!("expected drop, got {other:?}"),
        }
    }

    #[test]
    fn restricted_name_drops_regardless_of_case() {
        let pipeline = EventNamePipeline::new(config(), stack());
        let result = pipeline.execute("notification clicked");
        assert_eq!(
            result.outcome.drop_reason(),
            Some(DropReason::RestrictedEventName)
        );
    }

    #[test]
    fn discarded_name_drops() {
        let config = Arc::new(
            ValidationConfig::builder()
                .discarded_event_names(vec!["Legacy Event".to_string()])
                .build(),
        );
        let pipeline = EventNamePipeline::new(config, stack());
        let result = pipeline.execute("Legacy Event");
        assert_eq!(
            result.outcome.drop_reason(),
            Some(DropReason::DiscardedEventName)
        );
    }

    #[test]
    fn long_name_truncates_with_warning() {
        let config = Arc::new(ValidationConfig::builder().max_event_name_length(8).build());
        let pipeline = EventNamePipeline::new(config, stack());
        let result = pipeline.execute("Purchase Completed");
        assert_eq!(result.value, "Purchase");
        assert!(result.outcome.is_warning());
        assert_eq!(result.outcome.errors()[0].code, ErrorCode::Truncated);
    }

    #[test]
    fn key_stripped_to_nothing_is_empty_key_drop() {
        let config = Arc::new(
            ValidationConfig::builder()
                .key_chars_not_allowed(vec!['#'])
                .build(),
        );
        let pipeline = PropertyKeyPipeline::new(config, stack());
        let result = pipeline.execute("###");
        assert_eq!(result.outcome.drop_reason(), Some(DropReason::EmptyKey));
    }

    #[test]
    fn originally_empty_key_is_null_key_drop() {
        let pipeline = PropertyKeyPipeline::new(config(), stack());
        let result = pipeline.execute("");
        assert_eq!(result.outcome.drop_reason(), Some(DropReason::NullKey));
    }

    #[test]
    fn multi_value_chain_rejects_restricted_fields() {
        let base = PropertyKeyPipeline::new(config(), stack());
        assert!(base.execute("Email").outcome.is_success());

        let multi = PropertyKeyPipeline::for_multi_value(config(), stack());
        let result = multi.execute("email");
        assert_eq!(
            result.outcome.drop_reason(),
            Some(DropReason::RestrictedMultiValueKey)
        );
    }

    #[test]
    fn oversized_charged_event_warns_but_never_drops() {
        let config = Arc::new(
            ValidationConfig::builder()
                .max_charged_event_items(50)
                .build(),
        );
        let stack = stack();
        let pipeline = ChargedEventItemsPipeline::new(config, Arc::clone(&stack));

        let items: Vec<HashMap<String, PropertyValue>> = (0..60)
            .map(|i| HashMap::from([("Index".to_string(), PropertyValue::from(i as i64))]))
            .collect();
        let result = pipeline.execute(&items);
        assert_eq!(result.value, 60);
        assert!(result.outcome.is_warning());
        assert_eq!(
            result.outcome.errors()[0].code,
            ErrorCode::ChargedEventTooManyItems
        );
        assert_eq!(stack.len(), 1);

        let result = pipeline.execute(&items[..50]);
        assert!(result.outcome.is_success());
    }
}
