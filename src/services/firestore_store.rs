// src/services/firestore_store.rs
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;

use crate::{
    errors::{NotifierError, NotifierResult},
    models::driver::{DriverProfile, DriverTokenRecord},
    services::{
        auth_service::{AccessTokenSource, DATASTORE_SCOPE},
        recipient_service::{RecipientStore, StoreError, token_from_document},
    },
    utils::firestore::{Document, ListDocumentsResponse},
};

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub tokens_collection: String,
    pub drivers_collection: String,
    /// `host:port` of a local emulator, reached over plain HTTP.
    pub emulator_host: Option<String>,
}

/// Recipient lookups against Cloud Firestore through its REST API.
pub struct FirestoreRecipientStore {
    client: reqwest::Client,
    documents_url: Url,
    tokens_collection: String,
    drivers_collection: String,
    auth: AccessTokenSource,
}

impl FirestoreRecipientStore {
    pub fn new(config: FirestoreConfig, client: reqwest::Client, auth: AccessTokenSource) -> NotifierResult<Self> {
        let base = match &config.emulator_host {
            Some(host) => format!("http://{}/v1", host),
            None => FIRESTORE_URL.to_string(),
        };
        let documents_url = Url::parse(&format!(
            "{}/projects/{}/databases/(default)/documents/",
            base, config.project_id
        ))
        .map_err(|e| NotifierError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            client,
            documents_url,
            tokens_collection: config.tokens_collection,
            drivers_collection: config.drivers_collection,
            auth,
        })
    }

    fn document_url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Request(format!("cannot extend {}", self.documents_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url, query: &[(&str, String)]) -> Result<reqwest::Response, StoreError> {
        let bearer = self.auth.bearer(&[DATASTORE_SCOPE]).await?;
        let response = self.client.get(url).bearer_auth(bearer).query(query).send().await?;
        Ok(response)
    }

    async fn list_page(&self, page_token: Option<&str>) -> Result<ListDocumentsResponse, StoreError> {
        let url = self.document_url(&[self.tokens_collection.as_str()])?;
        let mut query = vec![("pageSize", PAGE_SIZE.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self.get(url, &query).await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<ListDocumentsResponse>().await?)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    Err(StoreError::Status { status, message })
}

fn token_record(document: &Document) -> Option<DriverTokenRecord> {
    let driver_id = document.id()?;
    let fields = Value::Object(document.plain_fields());
    Some(DriverTokenRecord::new(driver_id, token_from_document(&fields)))
}

#[async_trait]
impl RecipientStore for FirestoreRecipientStore {
    async fn list_token_records(&self) -> Result<Vec<DriverTokenRecord>, StoreError> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(page_token.as_deref()).await?;
            records.extend(page.documents.iter().filter_map(token_record));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::debug!("Listed {} driver token records from Firestore", records.len());
        Ok(records)
    }

    async fn get_driver_profile(&self, driver_id: &str) -> Result<Option<DriverProfile>, StoreError> {
        let url = self.document_url(&[self.drivers_collection.as_str(), driver_id])?;
        let response = self.get(url, &[]).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let document: Document = ensure_success(response).await?.json().await?;
        let fields = Value::Object(document.plain_fields());
        Ok(Some(DriverProfile::from_document(driver_id, &fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode as HttpStatus, Uri},
        response::{IntoResponse, Response},
    };
    use serde_json::json;
    use std::collections::HashMap;

    const DOCUMENTS: &str = "/v1/projects/ride-app/databases/(default)/documents";

    fn token_doc(driver_id: &str, token: &str) -> Value {
        json!({
            "name": format!("projects/ride-app/databases/(default)/documents/driverTokens/{}", driver_id),
            "fields": {"token": {"stringValue": token}}
        })
    }

    /// Serves two pages of token records, one driver profile, a 404 for
    /// every other document and a 500 for driver "broken".
    async fn emulator(uri: Uri, headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer tok") {
            return HttpStatus::UNAUTHORIZED.into_response();
        }
        match uri.path().strip_prefix(DOCUMENTS) {
            Some("/driverTokens") => match params.get("pageToken").map(String::as_str) {
                None => Json(json!({
                    "documents": [token_doc("d1", "tok1"), token_doc("d2", "tok2")],
                    "nextPageToken": "page-2"
                }))
                .into_response(),
                Some("page-2") => Json(json!({ "documents": [token_doc("d3", "tok3")] })).into_response(),
                Some(_) => HttpStatus::BAD_REQUEST.into_response(),
            },
            Some("/drivers/d1") => Json(json!({
                "name": "projects/ride-app/databases/(default)/documents/drivers/d1",
                "fields": {"notificationsEnabled": {"booleanValue": true}}
            }))
            .into_response(),
            Some("/drivers/broken") => (HttpStatus::INTERNAL_SERVER_ERROR, "backend unavailable").into_response(),
            _ => (
                HttpStatus::NOT_FOUND,
                Json(json!({"error": {"code": 404, "message": "Document not found", "status": "NOT_FOUND"}})),
            )
                .into_response(),
        }
    }

    async fn spawn_emulator() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().fallback(emulator)).await.unwrap();
        });
        addr.to_string()
    }

    async fn emulated_store() -> FirestoreRecipientStore {
        FirestoreRecipientStore::new(
            FirestoreConfig {
                project_id: "ride-app".to_string(),
                tokens_collection: "driverTokens".to_string(),
                drivers_collection: "drivers".to_string(),
                emulator_host: Some(spawn_emulator().await),
            },
            reqwest::Client::builder().no_proxy().build().unwrap(),
            AccessTokenSource::Static("tok".to_string()),
        )
        .unwrap()
    }

    fn store(emulator_host: Option<&str>) -> FirestoreRecipientStore {
        FirestoreRecipientStore::new(
            FirestoreConfig {
                project_id: "ride-app".to_string(),
                tokens_collection: "driverTokens".to_string(),
                drivers_collection: "drivers".to_string(),
                emulator_host: emulator_host.map(str::to_string),
            },
            reqwest::Client::new(),
            AccessTokenSource::Static("tok".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_document_urls() {
        let store = store(None);
        assert_eq!(
            store.document_url(&["drivers", "d 1"]).unwrap().as_str(),
            "https://firestore.googleapis.com/v1/projects/ride-app/databases/(default)/documents/drivers/d%201"
        );
    }

    #[test]
    fn test_emulator_base_url() {
        let store = store(Some("localhost:8080"));
        assert!(store.documents_url.as_str().starts_with("http://localhost:8080/v1/projects/ride-app/"));
    }

    #[test]
    fn test_token_record_from_document() {
        let document: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/driverTokens/d1",
            "fields": {"token": {"stringValue": "tok1"}}
        }))
        .unwrap();
        assert_eq!(token_record(&document), Some(DriverTokenRecord::new("d1", "tok1")));
    }

    #[tokio::test]
    async fn test_lists_every_page_in_order() {
        let store = emulated_store().await;
        let records = store.list_token_records().await.unwrap();
        assert_eq!(
            records,
            vec![
                DriverTokenRecord::new("d1", "tok1"),
                DriverTokenRecord::new("d2", "tok2"),
                DriverTokenRecord::new("d3", "tok3"),
            ]
        );
    }

    #[tokio::test]
    async fn test_profile_lookup() {
        let store = emulated_store().await;

        let profile = store.get_driver_profile("d1").await.unwrap().unwrap();
        assert_eq!(profile.driver_id, "d1");
        assert!(profile.notifications_enabled);

        assert!(store.get_driver_profile("d2").await.unwrap().is_none());

        let err = store.get_driver_profile("broken").await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 500, .. }));
    }
}
