// src/models/driver.rs
use serde::{Deserialize, Serialize};

/// One device registration: which push token belongs to which driver.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverTokenRecord {
    pub driver_id: String,
    pub token: String, // Empty when the registration carried no usable token
}

impl DriverTokenRecord {
    pub fn new(driver_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            driver_id: driver_id.into(),
            token: token.into(),
        }
    }

    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub driver_id: String,
    #[serde(default)]
    pub notifications_enabled: bool,
}

impl DriverProfile {
    /// Only a literal boolean `true` enables notifications; strings such as
    /// "true" or numbers do not.
    pub fn from_document(driver_id: impl Into<String>, document: &serde_json::Value) -> Self {
        Self {
            driver_id: driver_id.into(),
            notifications_enabled: document.get("notificationsEnabled") == Some(&serde_json::Value::Bool(true)),
        }
    }
}

/// Tokens eligible for one dispatch. Rebuilt per dispatch and never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipientSet {
    tokens: Vec<String>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `record`'s token if the profile allows it. Duplicate tokens
    /// (one device registered under two drivers) are kept once.
    pub fn consider(&mut self, record: &DriverTokenRecord, profile: Option<&DriverProfile>) -> bool {
        let eligible = matches!(profile, Some(p) if p.notifications_enabled) && record.has_token();
        if eligible && !self.tokens.contains(&record.token) {
            self.tokens.push(record.token.clone());
            return true;
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_requires_literal_true() {
        assert!(DriverProfile::from_document("d1", &json!({"notificationsEnabled": true})).notifications_enabled);
        assert!(!DriverProfile::from_document("d1", &json!({"notificationsEnabled": "true"})).notifications_enabled);
        assert!(!DriverProfile::from_document("d1", &json!({"notificationsEnabled": 1})).notifications_enabled);
        assert!(!DriverProfile::from_document("d1", &json!({})).notifications_enabled);
    }

    #[test]
    fn test_recipient_set_eligibility() {
        let enabled = DriverProfile { driver_id: "d1".into(), notifications_enabled: true };
        let disabled = DriverProfile { driver_id: "d2".into(), notifications_enabled: false };

        let mut set = RecipientSet::new();
        assert!(set.consider(&DriverTokenRecord::new("d1", "tok1"), Some(&enabled)));
        assert!(!set.consider(&DriverTokenRecord::new("d2", "tok2"), Some(&disabled)));
        assert!(!set.consider(&DriverTokenRecord::new("d3", "tok3"), None));
        assert!(!set.consider(&DriverTokenRecord::new("d1", ""), Some(&enabled)));

        assert_eq!(set.tokens(), ["tok1".to_string()]);
    }

    #[test]
    fn test_recipient_set_deduplicates_tokens() {
        let enabled = DriverProfile { driver_id: "d1".into(), notifications_enabled: true };
        let mut set = RecipientSet::new();
        set.consider(&DriverTokenRecord::new("d1", "shared"), Some(&enabled));
        set.consider(&DriverTokenRecord::new("d2", "shared"), Some(&enabled));
        assert_eq!(set.len(), 1);
    }
}
