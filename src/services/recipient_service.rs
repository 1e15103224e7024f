// src/services/recipient_service.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    errors::NotifierResult,
    models::driver::{DriverProfile, DriverTokenRecord},
    services::auth_service::AuthError,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("recipient store request failed: {0}")]
    Request(String),

    #[error("recipient store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected recipient store response: {0}")]
    Decode(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Request(err.to_string())
        }
    }
}

/// Read access to driver token registrations and driver settings.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Every registered (driver, token) pair. Full scan.
    async fn list_token_records(&self) -> Result<Vec<DriverTokenRecord>, StoreError>;

    /// `Ok(None)` when the driver has no profile.
    async fn get_driver_profile(&self, driver_id: &str) -> Result<Option<DriverProfile>, StoreError>;
}

/// Token documents come as `{"token": "..."}`; some registration flows
/// write the bare token string instead.
pub(crate) fn token_from_document(document: &Value) -> String {
    match document {
        Value::String(token) => token.clone(),
        Value::Object(fields) => fields
            .get("token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Seed layout, same shape as a Realtime Database export of the two nodes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySeed {
    #[serde(default)]
    pub driver_tokens: BTreeMap<String, Value>,
    #[serde(default)]
    pub drivers: BTreeMap<String, Value>,
}

/// In-process store for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryRecipientStore {
    tokens: RwLock<Vec<DriverTokenRecord>>,
    profiles: RwLock<BTreeMap<String, DriverProfile>>,
}

impl MemoryRecipientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: MemorySeed) -> Self {
        let tokens = seed
            .driver_tokens
            .iter()
            .map(|(driver_id, doc)| DriverTokenRecord::new(driver_id.clone(), token_from_document(doc)))
            .collect();
        let profiles = seed
            .drivers
            .iter()
            .map(|(driver_id, doc)| (driver_id.clone(), DriverProfile::from_document(driver_id.clone(), doc)))
            .collect();

        Self {
            tokens: RwLock::new(tokens),
            profiles: RwLock::new(profiles),
        }
    }

    pub async fn from_seed_file(path: impl AsRef<Path>) -> NotifierResult<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let seed: MemorySeed = serde_json::from_str(&raw)?;
        tracing::info!(
            "Loaded memory recipient store seed: {} token records, {} drivers",
            seed.driver_tokens.len(),
            seed.drivers.len()
        );
        Ok(Self::from_seed(seed))
    }

    pub async fn register_token(&self, driver_id: &str, token: &str) {
        let mut tokens = self.tokens.write().await;
        match tokens.iter_mut().find(|r| r.driver_id == driver_id) {
            Some(record) => record.token = token.to_string(),
            None => tokens.push(DriverTokenRecord::new(driver_id, token)),
        }
    }

    pub async fn set_profile(&self, driver_id: &str, notifications_enabled: bool) {
        self.profiles.write().await.insert(
            driver_id.to_string(),
            DriverProfile {
                driver_id: driver_id.to_string(),
                notifications_enabled,
            },
        );
    }
}

#[async_trait]
impl RecipientStore for MemoryRecipientStore {
    async fn list_token_records(&self) -> Result<Vec<DriverTokenRecord>, StoreError> {
        Ok(self.tokens.read().await.clone())
    }

    async fn get_driver_profile(&self, driver_id: &str) -> Result<Option<DriverProfile>, StoreError> {
        Ok(self.profiles.read().await.get(driver_id).cloned())
    }
}
