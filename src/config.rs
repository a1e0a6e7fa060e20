use bon::Builder;
use validator::Validate;

/// Event names reserved for SDK-generated system events. Host apps may not
/// raise these themselves.
pub const RESTRICTED_EVENT_NAMES: &[&str] = &[
    "App Launched",
    "App Uninstalled",
    "Notification Sent",
    "Notification Viewed",
    "Notification Clicked",
    "Session Concluded",
    "UTM Visited",
];

/// Profile fields that may never carry multi-value (list) payloads.
pub const RESTRICTED_MULTI_VALUE_FIELDS: &[&str] = &[
    "Name", "Email", "Phone", "Identity", "DOB", "Gender", "Age", "Education", "Married",
];

const DEFAULT_CHARS_NOT_ALLOWED: &[char] = &['.', ':', '$', '\'', '"', '\\'];

/// Tunable limits for the validation pipelines.
///
/// Built once per engine instance and read-only afterwards; every pipeline
/// invocation receives it by reference.
#[derive(Debug, Clone, Builder, Validate)]
pub struct ValidationConfig {
    #[builder(default = 512)]
    #[validate(range(min = 1, message = "max_event_name_length must be at least 1"))]
    pub max_event_name_length: usize,

    #[builder(default = DEFAULT_CHARS_NOT_ALLOWED.to_vec())]
    pub event_name_chars_not_allowed: Vec<char>,

    #[builder(default = RESTRICTED_EVENT_NAMES.iter().map(|s| s.to_string()).collect())]
    pub restricted_event_names: Vec<String>,

    /// Server-configured names whose events are silently discarded. Empty by
    /// default; populated from the backend handshake.
    #[builder(default)]
    pub discarded_event_names: Vec<String>,

    #[builder(default = 120)]
    #[validate(range(min = 1, message = "max_key_length must be at least 1"))]
    pub max_key_length: usize,

    #[builder(default = DEFAULT_CHARS_NOT_ALLOWED.to_vec())]
    pub key_chars_not_allowed: Vec<char>,

    #[builder(default = RESTRICTED_MULTI_VALUE_FIELDS.iter().map(|s| s.to_string()).collect())]
    pub restricted_multi_value_fields: Vec<String>,

    #[builder(default = 50)]
    #[validate(range(min = 1, message = "max_charged_event_items must be at least 1"))]
    pub max_charged_event_items: usize,
}

impl ValidationConfig {
    pub fn validate_config(&self) -> crate::error::Result<()> {
        Validate::validate(self).map_err(|e| {
            crate::error::EngineError::configuration(format!("Config validation failed: {e}"))
        })
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
