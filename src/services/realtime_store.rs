// src/services/realtime_store.rs
use async_trait::async_trait;
use firebase_rs::{Firebase, RequestError};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{
    errors::{NotifierError, NotifierResult},
    models::driver::{DriverProfile, DriverTokenRecord},
    services::recipient_service::{RecipientStore, StoreError, token_from_document},
};

/// Recipient lookups against the Firebase Realtime Database.
///
/// Expected layout: `{tokens_path}/{driverId}` holding `{"token": ...}` (or
/// the bare token) and `{drivers_path}/{driverId}` holding the driver
/// settings.
pub struct RealtimeRecipientStore {
    firebase: Firebase,
    tokens_path: String,
    drivers_path: String,
}

impl RealtimeRecipientStore {
    pub fn new(
        database_url: &str,
        auth_token: Option<&str>,
        tokens_path: impl Into<String>,
        drivers_path: impl Into<String>,
    ) -> NotifierResult<Self> {
        let firebase = match auth_token {
            Some(token) => Firebase::auth(database_url, token),
            None => Firebase::new(database_url),
        }
        .map_err(|e| NotifierError::InvalidUrl(format!("{}: {:?}", database_url, e)))?;

        Ok(Self {
            firebase,
            tokens_path: tokens_path.into(),
            drivers_path: drivers_path.into(),
        })
    }
}

/// An absent node comes back as a null body, which is "nothing there"
/// rather than a failure.
fn absent_as_none<T>(result: Result<Option<T>, RequestError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(value),
        Err(RequestError::NotFoundOrNullBody) => Ok(None),
        Err(e) => Err(StoreError::Request(format!("{:?}", e))),
    }
}

#[async_trait]
impl RecipientStore for RealtimeRecipientStore {
    async fn list_token_records(&self) -> Result<Vec<DriverTokenRecord>, StoreError> {
        let nodes = absent_as_none(
            self.firebase
                .at(&self.tokens_path)
                .get::<Option<BTreeMap<String, Value>>>()
                .await,
        )?
        .unwrap_or_default();

        Ok(nodes
            .iter()
            .map(|(driver_id, node)| DriverTokenRecord::new(driver_id.clone(), token_from_document(node)))
            .collect())
    }

    async fn get_driver_profile(&self, driver_id: &str) -> Result<Option<DriverProfile>, StoreError> {
        let node = absent_as_none(
            self.firebase
                .at(&self.drivers_path)
                .at(driver_id)
                .get::<Option<Value>>()
                .await,
        )?;

        Ok(node.map(|document| DriverProfile::from_document(driver_id, &document)))
    }
}
