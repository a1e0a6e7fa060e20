//! Campaign definitions as delivered by the backend, and the parse boundary
//! that turns their JSON into typed values.
//!
//! A malformed definition is never allowed to take the host application down:
//! [`parse_campaigns`] skips invalid entries with a warning and keeps the
//! rest.

use crate::error::{EngineError, Result};
use crate::events::PropertyValue;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Comparison operator of one trigger condition. The numeric tags are the
/// backend's wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TriggerOperator {
    GreaterThan,
    Equals,
    LessThan,
    Contains,
    Between,
    NotEquals,
    Set,
    NotSet,
    NotContains,
}

impl TryFrom<u8> for TriggerOperator {
    type Error = EngineError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::GreaterThan),
            1 => Ok(Self::Equals),
            2 => Ok(Self::LessThan),
            3 => Ok(Self::Contains),
            4 => Ok(Self::Between),
            15 => Ok(Self::NotEquals),
            26 => Ok(Self::Set),
            27 => Ok(Self::NotSet),
            28 => Ok(Self::NotContains),
            other => Err(EngineError::definition(format!(
                "Unknown trigger operator code {other}"
            ))),
        }
    }
}

impl From<TriggerOperator> for u8 {
    fn from(op: TriggerOperator) -> Self {
        match op {
            TriggerOperator::GreaterThan => 0,
            TriggerOperator::Equals => 1,
            TriggerOperator::LessThan => 2,
            TriggerOperator::Contains => 3,
            TriggerOperator::Between => 4,
            TriggerOperator::NotEquals => 15,
            TriggerOperator::Set => 26,
            TriggerOperator::NotSet => 27,
            TriggerOperator::NotContains => 28,
        }
    }
}

/// One property condition inside a trigger. Conditions of a trigger are
/// AND-ed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyCondition {
    pub property_name: String,
    pub operator: TriggerOperator,
    /// Absent for `Set`/`NotSet`, which need no operand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_value: Option<PropertyValue>,
}

/// One alternative trigger definition of a campaign. Triggers are OR-ed
/// across the campaign's list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDef {
    pub event_name: String,
    #[serde(default)]
    pub event_properties: Vec<PropertyCondition>,
    /// Item-level conditions, evaluated against charged-event items only.
    #[serde(default)]
    pub item_properties: Vec<PropertyCondition>,
}

/// Frequency cap categories. `OnEvery`/`OnExactly` count matching trigger
/// fires; everything else counts impressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitType {
    Ever,
    Session,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    OnEvery,
    OnExactly,
}

impl LimitType {
    /// Milliseconds per unit for the trailing-window categories.
    pub(crate) fn unit_millis(self) -> Option<i64> {
        match self {
            Self::Seconds => Some(1_000),
            Self::Minutes => Some(60_000),
            Self::Hours => Some(3_600_000),
            Self::Days => Some(86_400_000),
            Self::Weeks => Some(604_800_000),
            Self::Ever | Self::Session | Self::OnEvery | Self::OnExactly => None,
        }
    }
}

/// One frequency cap. A campaign's when-limits array is AND-ed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitDef {
    #[serde(rename = "type")]
    pub limit_type: LimitType,
    /// Maximum impressions for the count-based categories.
    #[serde(default)]
    pub limit: u32,
    /// Window size in units for the window categories; fire count for
    /// `OnEvery`/`OnExactly`.
    #[serde(default)]
    pub frequency: u32,
}

/// A server-defined messaging unit: trigger conditions plus display limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    #[serde(default)]
    pub when_triggers: Vec<TriggerDef>,
    #[serde(default)]
    pub when_limits: Vec<LimitDef>,
}

/// Parses one campaign definition, rejecting empty ids.
pub fn parse_campaign(json: &str) -> Result<Campaign> {
    let campaign: Campaign = serde_json::from_str(json)?;
    if campaign.id.trim().is_empty() {
        return Err(EngineError::definition("Campaign id is empty"));
    }
    Ok(campaign)
}

/// Parses a backend campaign array leniently: entries that fail to parse are
/// skipped with a warning so one bad definition cannot poison the batch.
pub fn parse_campaigns(json: &str) -> Result<Vec<Campaign>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| EngineError::from(e).with_context("Campaign array"))?;

    let mut campaigns = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Campaign>(entry)
            .map_err(EngineError::from)
            .and_then(|c| {
                if c.id.trim().is_empty() {
                    Err(EngineError::definition("Campaign id is empty"))
                } else {
                    Ok(c)
                }
            }) {
            Ok(campaign) => campaigns.push(campaign),
            Err(e) => {
                warn!("Skipping invalid campaign definition at index {}: {}", index, e);
            }
        }
    }
    Ok(campaigns)
}
