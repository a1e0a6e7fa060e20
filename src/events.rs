use bon::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A property value attached to an event, or an expected operand from a
/// campaign trigger definition.
///
/// Comparison never happens on the raw variants directly; operators go
/// through [`PropertyValue::number_value`] and [`PropertyValue::string_value`]
/// so that `150`, `150.0` and `"150"` all compare equal numerically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Numeric view of the value. Numeric strings coerce; bools and lists do
    /// not.
    pub fn number_value(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            Self::Bool(_) | Self::List(_) => None,
        }
    }

    /// String view of the value. Lists have no single string form.
    pub fn string_value(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// A fired analytics event. Immutable once built; the validation pipelines
/// produce the cleaned name and property keys before construction.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "eventName")]
    #[builder(into)]
    pub name: String,

    #[serde(default)]
    #[builder(default, with = |iter: impl IntoIterator<Item = (impl Into<String>, impl Into<PropertyValue>)>| {
        iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    })]
    pub properties: HashMap<String, PropertyValue>,

    /// Purchased items, present only on charged events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub items: Vec<HashMap<String, PropertyValue>>,
}

impl Event {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Collects the value of `name` across all purchased items, in item
    /// order. Items missing the property contribute nothing.
    pub fn item_values(&self, name: &str) -> Vec<PropertyValue> {
        self.items
            .iter()
            .filter_map(|item| item.get(name).cloned())
            .collect()
    }
}
