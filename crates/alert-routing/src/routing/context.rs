use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, RoutingError};

/// Alert priority as produced by the scoring pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// The alert being routed. Owned upstream; the engine only reads it.
///
/// Rule conditions address fields by their serialized names, e.g.
/// `confidence`, `territory` or `metadata.account.tier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertContext {
    pub alert_id: String,
    #[serde(default)]
    pub subject_user_id: Option<String>,
    pub alert_type: String,
    /// 0.0 to 1.0
    pub confidence: f64,
    #[serde(default)]
    pub priority: AlertPriority,
    #[serde(default)]
    pub territory: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AlertContext {
    pub fn new(alert_id: impl Into<String>, alert_type: impl Into<String>, confidence: f64) -> Self {
        Self {
            alert_id: alert_id.into(),
            subject_user_id: None,
            alert_type: alert_type.into(),
            confidence,
            priority: AlertPriority::default(),
            territory: None,
            metadata: Map::new(),
        }
    }

    pub fn with_subject(mut self, user_id: impl Into<String>) -> Self {
        self.subject_user_id = Some(user_id.into());
        self
    }

    pub fn with_priority(mut self, priority: AlertPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_territory(mut self, territory: impl Into<String>) -> Self {
        self.territory = Some(territory.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.alert_id.trim().is_empty() {
            return Err(RoutingError::invalid_input("alert_id cannot be empty"));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(RoutingError::invalid_input(format!(
                "confidence {} outside 0..=1 for alert {}",
                self.confidence, self.alert_id
            )));
        }
        Ok(())
    }

    /// JSON view used for dot-path condition evaluation
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
