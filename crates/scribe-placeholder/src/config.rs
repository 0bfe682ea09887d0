use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Recognized placeholder option types. An open allow-list rather than a
/// closed enum: embedding applications may grow it over time, and stored
/// documents can carry types that were since removed.
pub const ALLOWED_OPTION_TYPES: &[&str] = &["calltoaction"];

pub fn is_allowed_type(option_type: &str) -> bool {
    ALLOWED_OPTION_TYPES.contains(&option_type)
}

/// One insertable placeholder. `label` is the display text, supplied already
/// localized by the embedding application; `value` is the stable machine
/// identifier that survives label and translation changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderOption {
    pub label: String,
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl PlaceholderOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Configuration supplied by the embedding application. Option order
/// determines dropdown presentation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderConfig {
    /// Dropdown button text.
    pub label: String,
    #[serde(default)]
    pub options: Vec<PlaceholderOption>,
}

impl PlaceholderConfig {
    pub fn option_for_value(&self, value: &str) -> Option<&PlaceholderOption> {
        self.options.iter().find(|option| option.value == value)
    }
}

/// A single configuration defect, naming the offending option (by position)
/// and field where one applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub option: Option<usize>,
    pub field: &'static str,
    pub message: String,
}

impl ConfigIssue {
    fn config(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            option: None,
            field,
            message: message.into(),
        }
    }

    fn option(index: usize, field: &'static str, message: impl Into<String>) -> Self {
        Self {
            option: Some(index),
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.option {
            Some(index) => write!(f, "option[{index}].{}: {}", self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// Validates the configuration. Pure: returns every defect found; an empty
/// result means the feature can be enabled.
pub fn validate_config(config: &PlaceholderConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    if config.label.is_empty() {
        issues.push(ConfigIssue::config(
            "label",
            "a label for the toolbar dropdown is required",
        ));
    }

    if config.options.is_empty() {
        issues.push(ConfigIssue::config(
            "options",
            "at least one option is required",
        ));
    }

    let mut seen_values: HashSet<&str> = HashSet::new();
    for (index, option) in config.options.iter().enumerate() {
        if option.label.is_empty() {
            issues.push(ConfigIssue::option(index, "label", "a label is required"));
        }
        if option.value.is_empty() {
            issues.push(ConfigIssue::option(index, "value", "a value is required"));
        } else if !seen_values.insert(option.value.as_str()) {
            issues.push(ConfigIssue::option(
                index,
                "value",
                format!("duplicate value {:?}", option.value),
            ));
        }
        if let Some(kind) = &option.kind {
            if !is_allowed_type(kind) {
                issues.push(ConfigIssue::option(
                    index,
                    "type",
                    format!(
                        "unknown type {:?}; allowed: {}",
                        kind,
                        ALLOWED_OPTION_TYPES.join(", ")
                    ),
                ));
            }
        }
    }

    issues
}
