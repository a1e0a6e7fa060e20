//! Trigger matching: does a fired event satisfy a campaign's trigger
//! definitions?
//!
//! Triggers are OR-ed (first match wins); a trigger's conditions are AND-ed.
//! Matching returns plain booleans: no match is a valid outcome, not an
//! error.

use crate::campaign::{PropertyCondition, TriggerDef, TriggerOperator};
use crate::events::{Event, PropertyValue};

pub struct TriggersMatcher;

impl TriggersMatcher {
    /// True when some trigger names the event exactly (case-sensitive) and
    /// all of its property conditions hold.
    pub fn match_event(triggers: &[TriggerDef], event: &Event) -> bool {
        triggers
            .iter()
            .any(|trigger| Self::match_trigger(trigger, event, false))
    }

    /// [`Self::match_event`] plus item-level conditions, each evaluated
    /// against the aggregated values of that property across all purchased
    /// items.
    pub fn match_charged_event(triggers: &[TriggerDef], event: &Event) -> bool {
        triggers
            .iter()
            .any(|trigger| Self::match_trigger(trigger, event, true))
    }

    fn match_trigger(trigger: &TriggerDef, event: &Event, include_items: bool) -> bool {
        if trigger.event_name != event.name {
            return false;
        }

        let properties_hold = trigger
            .event_properties
            .iter()
            .all(|condition| Self::evaluate_condition(condition, event.property(&condition.property_name)));
        if !properties_hold {
            return false;
        }

        if !include_items {
            return true;
        }
        trigger.item_properties.iter().all(|condition| {
            let values = event.item_values(&condition.property_name);
            if values.is_empty() {
                Self::evaluate_condition(condition, None)
            } else {
                Self::evaluate_condition(condition, Some(&PropertyValue::List(values)))
            }
        })
    }

    /// A missing actual value satisfies only `NotSet`.
    fn evaluate_condition(condition: &PropertyCondition, actual: Option<&PropertyValue>) -> bool {
        let actual = match actual {
            None => return condition.operator == TriggerOperator::NotSet,
            Some(actual) => actual,
        };
        match condition.operator {
            TriggerOperator::Set => true,
            TriggerOperator::NotSet => false,
            operator => {
                let Some(expected) = condition.property_value.as_ref() else {
                    return false;
                };
                Self::evaluate(operator, expected, actual)
            }
        }
    }

    fn evaluate(operator: TriggerOperator, expected: &PropertyValue, actual: &PropertyValue) -> bool {
        match operator {
            TriggerOperator::Equals => equals(expected, actual),
            TriggerOperator::NotEquals => !equals(expected, actual),
            TriggerOperator::Contains => contains(expected, actual),
            TriggerOperator::NotContains => !contains(expected, actual),
            TriggerOperator::GreaterThan => compare(expected, actual, |a, e| a > e),
            TriggerOperator::LessThan => compare(expected, actual, |a, e| a < e),
            TriggerOperator::Between => between(expected, actual),
            TriggerOperator::Set => true,
            TriggerOperator::NotSet => false,
        }
    }
}

fn compare(expected: &PropertyValue, actual: &PropertyValue, cmp: fn(f64, f64) -> bool) -> bool {
    match (actual.number_value(), expected.number_value()) {
        (Some(a), Some(e)) => cmp(a, e),
        _ => false,
    }
}

/// Inclusive range check; the expected operand is a 2-element numeric list.
fn between(expected: &PropertyValue, actual: &PropertyValue) -> bool {
    let Some(range) = expected.as_list() else {
        return false;
    };
    let (Some(low), Some(high)) = (
        range.first().and_then(PropertyValue::number_value),
        range.get(1).and_then(PropertyValue::number_value),
    ) else {
        return false;
    };
    match actual.number_value() {
        Some(a) => low <= a && a <= high,
        None => false,
    }
}

/// Numeric equality when both sides coerce to numbers, string equality
/// otherwise; list operands mean membership, two lists mean intersection.
fn equals(expected: &PropertyValue, actual: &PropertyValue) -> bool {
    any_pair(expected, actual, scalar_equals)
}

/// Substring test on string shapes; equality for non-string candidates.
fn contains(expected: &PropertyValue, actual: &PropertyValue) -> bool {
    any_pair(expected, actual, |e, a| {
        let string_shaped =
            matches!(e, PropertyValue::String(_)) || matches!(a, PropertyValue::String(_));
        if string_shaped {
            match (a.string_value(), e.string_value()) {
                (Some(a), Some(e)) => a.contains(&e),
                _ => false,
            }
        } else {
            scalar_equals(e, a)
        }
    })
}

fn scalar_equals(expected: &PropertyValue, actual: &PropertyValue) -> bool {
    if let (Some(e), Some(a)) = (expected.number_value(), actual.number_value()) {
        return a == e;
    }
    match (expected.string_value(), actual.string_value()) {
        (Some(e), Some(a)) => a == e,
        _ => false,
    }
}

fn any_pair(
    expected: &PropertyValue,
    actual: &PropertyValue,
    check: impl Fn(&PropertyValue, &PropertyValue) -> bool,
) -> bool {
    let expected_candidates = candidates(expected);
    candidates(actual)
        .iter()
        .any(|a| expected_candidates.iter().any(|e| check(e, a)))
}

fn candidates(value: &PropertyValue) -> Vec<&PropertyValue> {
    match value.as_list() {
        Some(values) => values.iter().collect(),
        None => vec![value],
    }
}
