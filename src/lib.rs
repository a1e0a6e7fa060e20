//! In-app campaign engine
//!
//! A synchronous core for mobile engagement SDKs: validates outbound
//! analytics events through staged normalize/validate pipelines, and decides
//! which in-app campaigns an event makes eligible, honoring trigger
//! conditions and frequency caps.
//!
//! # Example
//!
//! ```rust, no_run
//! use inapp_engine::{CampaignEngine, PropertyValue, ValidationConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = CampaignEngine::new(ValidationConfig::default())?;
//!     engine.load_campaigns(
//!         r#"[{
//!             "id": "welcome-offer",
//!             "whenTriggers": [{
//!                 "eventName": "Charged",
//!                 "eventProperties": [
//!                     {"propertyName": "Amount", "operator": 0, "propertyValue": 100}
//!                 ]
//!             }],
//!             "whenLimits": [{"type": "session", "limit": 2}]
//!         }]"#,
//!     )?;
//!
//!     let validated = engine.validate_event(
//!         "Charged",
//!         [("Amount", PropertyValue::from(150))],
//!         Vec::new(),
//!     );
//!     if let Some(event) = validated.event {
//!         for campaign_id in engine.evaluate(&event) {
//!             engine.record_impression(&campaign_id);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod campaign;
pub mod config;
pub mod error;
pub mod events;
pub mod impressions;
pub mod limits;
pub mod metrics;
pub mod pipelines;
pub mod triggers;
pub mod validation;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

pub use campaign::{
    Campaign, LimitDef, LimitType, PropertyCondition, TriggerDef, TriggerOperator, parse_campaign,
    parse_campaigns,
};
pub use config::ValidationConfig;
pub use error::{EngineError, Result};
pub use events::{Event, PropertyValue};
pub use impressions::{ImpressionManager, ImpressionStore, InMemoryImpressionStore};
pub use limits::LimitsMatcher;
pub use metrics::{EngineMetrics, EngineMetricsSummary};
pub use pipelines::{
    ChargedEventItemsPipeline, EventNamePipeline, PipelineResult, PropertyKeyPipeline,
};
pub use triggers::TriggersMatcher;
pub use validation::{
    DropReason, ErrorCode, Modification, NormalizationResult, ValidationError, ValidationOutcome,
    ValidationResultStack,
};

/// The engine owning one SDK instance's campaign set, pipelines, impression
/// history, and diagnostics.
///
/// # Architecture
///
/// - **Validation layer**: normalize/validate pipelines run synchronously on
///   the caller's thread before an event may be queued for delivery.
/// - **Evaluation layer**: trigger matching and frequency caps decide which
///   campaigns an event surfaces.
/// - **Impression layer**: display history behind a pluggable store.
///
/// No process-wide state: construct one engine per SDK instance and pass it
/// by reference.
pub struct CampaignEngine {
    config: Arc<ValidationConfig>,
    campaigns: Vec<Campaign>,
    impressions: ImpressionManager,
    stack: Arc<ValidationResultStack>,
    metrics: EngineMetrics,
    event_name_pipeline: EventNamePipeline,
    property_key_pipeline: PropertyKeyPipeline,
    multi_value_key_pipeline: PropertyKeyPipeline,
    charged_items_pipeline: ChargedEventItemsPipeline,
}

/// Result of running one raw event through the validation pipelines.
///
/// `event` is `None` exactly when the event name dropped; dropped property
/// keys remove only that property, and their diagnostics ride along in
/// `outcome`.
#[derive(Debug, Clone)]
pub struct ValidatedEvent {
    pub event: Option<Event>,
    pub outcome: ValidationOutcome,
}

impl CampaignEngine {
    /// Create an engine with the default in-memory impression store.
    ///
    /// # Errors
    /// Returns an error if the configuration fails validation.
    pub fn new(config: ValidationConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryImpressionStore::new()))
    }

    /// Create an engine backed by a host-provided impression store.
    pub fn with_store(config: ValidationConfig, store: Arc<dyn ImpressionStore>) -> Result<Self> {
        config.validate_config()?;
        let config = Arc::new(config);
        let stack = Arc::new(ValidationResultStack::new());

        Ok(Self {
            event_name_pipeline: EventNamePipeline::new(Arc::clone(&config), Arc::clone(&stack)),
            property_key_pipeline: PropertyKeyPipeline::new(
                Arc::clone(&config),
                Arc::clone(&stack),
            ),
            multi_value_key_pipeline: PropertyKeyPipeline::for_multi_value(
                Arc::clone(&config),
                Arc::clone(&stack),
            ),
            charged_items_pipeline: ChargedEventItemsPipeline::new(
                Arc::clone(&config),
                Arc::clone(&stack),
            ),
            impressions: ImpressionManager::new(store),
            campaigns: Vec::new(),
            metrics: EngineMetrics::new(),
            config,
            stack,
        })
    }

    /// Loads a backend campaign array, skipping invalid definitions. Returns
    /// how many campaigns were added.
    ///
    /// # Errors
    /// Returns an error only when the payload is not a JSON array at all.
    pub fn load_campaigns(&mut self, json: &str) -> Result<usize> {
        let campaigns = parse_campaigns(json)?;
        let added = campaigns.len();
        self.campaigns.extend(campaigns);
        Ok(added)
    }

    pub fn add_campaign(&mut self, campaign: Campaign) {
        self.campaigns.push(campaign);
    }

    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Runs a raw event through the validation pipelines.
    ///
    /// The event name dropping rejects the whole event. A dropped property
    /// key discards that property only; the event proceeds with the rest and
    /// the diagnostics surface in the aggregated outcome. Item keys are
    /// validated the same way, and the charged-items count check runs
    /// whenever items are present.
    pub fn validate_event<K, V>(
        &self,
        raw_name: &str,
        raw_properties: impl IntoIterator<Item = (K, V)>,
        raw_items: Vec<HashMap<String, PropertyValue>>,
    ) -> ValidatedEvent
    where
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        let name_result = self.event_name_pipeline.execute(raw_name);
        let mut errors = name_result.outcome.errors().to_vec();
        if let Some(reason) = name_result.outcome.drop_reason() {
            self.metrics.record_event_dropped();
            return ValidatedEvent {
                event: None,
                outcome: ValidationOutcome::Drop { errors, reason },
            };
        }

        let mut properties = HashMap::new();
        for (raw_key, value) in raw_properties {
            let raw_key: String = raw_key.into();
            let value: PropertyValue = value.into();
            if let Some((key, value)) = self.validate_property(&raw_key, value, &mut errors) {
                properties.insert(key, value);
            }
        }

        let mut items = Vec::with_capacity(raw_items.len());
        for raw_item in raw_items {
            let mut item = HashMap::new();
            for (raw_key, value) in raw_item {
                if let Some((key, value)) = self.validate_property(&raw_key, value, &mut errors) {
                    item.insert(key, value);
                }
            }
            items.push(item);
        }
        if !items.is_empty() {
            let count_result = self.charged_items_pipeline.execute(&items);
            errors.extend(count_result.outcome.errors().iter().cloned());
        }

        let outcome = if errors.is_empty() {
            self.metrics.record_event_validated();
            ValidationOutcome::Success
        } else {
            self.metrics.record_event_warned();
            ValidationOutcome::Warning { errors }
        };
        ValidatedEvent {
            event: Some(Event {
                name: name_result.value,
                properties,
                items,
            }),
            outcome,
        }
    }

    /// Multi-value (list) properties go through the chain with the
    /// restricted-field rule; everything else takes the base chain.
    fn validate_property(
        &self,
        raw_key: &str,
        value: PropertyValue,
        errors: &mut Vec<ValidationError>,
    ) -> Option<(String, PropertyValue)> {
        let pipeline = if value.is_list() {
            &self.multi_value_key_pipeline
        } else {
            &self.property_key_pipeline
        };
        let result = pipeline.execute(raw_key);
        errors.extend(result.outcome.errors().iter().cloned());
        if result.is_dropped() {
            None
        } else {
            Some((result.value, value))
        }
    }

    /// Decides which campaigns this event makes eligible, in campaign order.
    ///
    /// Matching bumps each matched campaign's trigger-fire counter before its
    /// limits are consulted, so occurrence limits see the fire that is being
    /// evaluated.
    pub fn evaluate(&self, event: &Event) -> Vec<String> {
        let mut eligible = Vec::new();
        for campaign in &self.campaigns {
            let matched = if event.items.is_empty() {
                TriggersMatcher::match_event(&campaign.when_triggers, event)
            } else {
                TriggersMatcher::match_charged_event(&campaign.when_triggers, event)
            };
            if !matched {
                continue;
            }
            self.metrics.record_campaign_matched();
            self.impressions.record_trigger_fire(&campaign.id);

            if LimitsMatcher::match_limits(&campaign.when_limits, &campaign.id, &self.impressions)
            {
                debug!("Campaign {} eligible for event {}", campaign.id, event.name);
                eligible.push(campaign.id.clone());
            } else {
                self.metrics.record_campaign_suppressed();
                debug!("Campaign {} suppressed by its limits", campaign.id);
            }
        }
        eligible
    }

    /// The host calls this when a campaign is actually displayed.
    pub fn record_impression(&self, campaign_id: &str) {
        self.impressions.record_impression(campaign_id);
        self.metrics.record_impression();
    }

    /// Starts a fresh session: per-session impression counters reset.
    pub fn start_session(&self) {
        self.impressions.start_session();
    }

    pub fn impressions(&self) -> &ImpressionManager {
        &self.impressions
    }

    /// Drains everything the pipelines reported since the last call, oldest
    /// first, for the reporting channel.
    pub fn drain_validation_errors(&self) -> Vec<ValidationError> {
        self.stack.drain()
    }

    /// Get a snapshot of engine activity counters.
    pub fn metrics(&self) -> EngineMetricsSummary {
        self.metrics.summary()
    }

    /// Reset all activity counters to zero.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }
}

pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_campaign() -> CampaignEngine {
        let mut engine = CampaignEngine::new(ValidationConfig::default()).unwrap();
        engine
            .load_campaigns(
                r#"[{
                    "id": "welcome-offer",
                    "whenTriggers": [{
                        "eventName": "Charged",
                        "eventProperties": [
                            {"propertyName": "Amount", "operator": 0, "propertyValue": 100}
                        ]
                    }],
                    "whenLimits": [{"type": "session", "limit": 2}]
                }]"#,
            )
            .unwrap();
        engine
    }

    #[test]
    fn validated_event_flows_into_evaluation() -> anyhow::Result<()> {
        let engine = engine_with_campaign();

        let validated = engine.validate_event(
            "Charged",
            [("Amount", PropertyValue::from(150))],
            Vec::new(),
        );
        assert!(validated.outcome.is_success());
        let event = validated.event.expect("event survives validation");

        assert_eq!(engine.evaluate(&event), vec!["welcome-offer".to_string()]);

        // Two impressions exhaust the session limit.
        engine.record_impression("welcome-offer");
        engine.record_impression("welcome-offer");
        assert!(engine.evaluate(&event).is_empty());

        engine.start_session();
        assert_eq!(engine.evaluate(&event), vec!["welcome-offer".to_string()]);
        Ok(())
    }

    #[test]
    fn restricted_event_name_rejects_the_event() {
        let engine = engine_with_campaign();
        let validated = engine.validate_event(
            "Notification Clicked",
            [("Amount", PropertyValue::from(150))],
            Vec::new(),
        );
        assert!(validated.event.is_none());
        assert_eq!(
            validated.outcome.drop_reason(),
            Some(DropReason::RestrictedEventName)
        );
    }

    #[test]
    fn dropped_property_key_spares_the_rest_of_the_event() {
        let engine = engine_with_campaign();
        let validated = engine.validate_event(
            "Charged",
            [
                ("$$$".to_string(), PropertyValue::from("noise")),
                ("Amount".to_string(), PropertyValue::from(150)),
            ],
            Vec::new(),
        );
        assert!(validated.outcome.is_warning());
        let event = validated.event.unwrap();
        assert_eq!(event.properties.len(), 1);
        assert!(event.property("Amount").is_some());
    }

    #[test]
    fn cleaned_name_and_keys_feed_the_event() {
        let engine = engine_with_campaign();
        let validated = engine.validate_event(
            "  Charged$",
            [("Am:ount", PropertyValue::from(150))],
            Vec::new(),
        );
        assert!(validated.outcome.is_warning());
        let event = validated.event.unwrap();
        assert_eq!(event.name, "Charged");
        assert!(event.property("Amount").is_some());
        assert!(!engine.drain_validation_errors().is_empty());
    }

    #[test]
    fn charged_event_evaluation_uses_item_conditions() {
        let mut engine = CampaignEngine::new(ValidationConfig::default()).unwrap();
        engine
            .load_campaigns(
                r#"[{
                    "id": "book-buyers",
                    "whenTriggers": [{
                        "eventName": "Charged",
                        "itemProperties": [
                            {"propertyName": "Category", "operator": 1, "propertyValue": "books"}
                        ]
                    }]
                }]"#,
            )
            .unwrap();

        let items = vec![HashMap::from([(
            "Category".to_string(),
            PropertyValue::from("books"),
        )])];
        let validated = engine.validate_event::<String, PropertyValue>("Charged", [], items);
        let event = validated.event.unwrap();
        assert_eq!(engine.evaluate(&event), vec!["book-buyers".to_string()]);

        let other = vec![HashMap::from([(
            "Category".to_string(),
            PropertyValue::from("games"),
        )])];
        let validated = engine.validate_event::<String, PropertyValue>("Charged", [], other);
        assert!(engine.evaluate(&validated.event.unwrap()).is_empty());
    }

    #[test]
    fn metrics_track_the_full_flow() {
        let engine = engine_with_campaign();

        let validated = engine.validate_event(
            "Charged",
            [("Amount", PropertyValue::from(150))],
            Vec::new(),
        );
        let event = validated.event.unwrap();
        engine.evaluate(&event);
        engine.record_impression("welcome-offer");
        engine.validate_event("", Vec::<(String, PropertyValue)>::new(), Vec::new());

        let summary = engine.metrics();
        assert_eq!(summary.events_validated, 1);
        assert_eq!(summary.events_dropped, 1);
        assert_eq!(summary.campaigns_matched, 1);
        assert_eq!(summary.impressions_recorded, 1);
        assert_eq!(summary.total_events, 2);

        engine.reset_metrics();
        assert_eq!(engine.metrics().total_events, 0);
    }

    #[test]
    fn occurrence_limit_counts_trigger_fires_across_evaluations() {
        let mut engine = CampaignEngine::new(ValidationConfig::default()).unwrap();
        engine
            .load_campaigns(
                r#"[{
                    "id": "third-view",
                    "whenTriggers": [{"eventName": "Product Viewed"}],
                    "whenLimits": [{"type": "onEvery", "frequency": 3}]
                }]"#,
            )
            .unwrap();

        let event = Event::builder().name("Product Viewed").build();
        assert!(engine.evaluate(&event).is_empty());
        assert!(engine.evaluate(&event).is_empty());
        assert_eq!(engine.evaluate(&event), vec!["third-view".to_string()]);
        assert!(engine.evaluate(&event).is_empty());
    }
}
