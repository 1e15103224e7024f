// src/services/messaging_service.rs
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::{
    models::messages::{BatchResponse, MulticastMessage, SendError, SendResponse},
    services::auth_service::{AccessTokenSource, AuthError, FCM_SCOPE},
    utils::id_generator::generate_message_id,
};

/// Failure of a whole multicast call. Per-token failures are not errors;
/// they come back inside the `BatchResponse`.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("multicast message has no tokens")]
    NoTokens,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub project_id: String,
    pub fcm_url: String,
    pub send_concurrency: usize,
}

impl FcmConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            fcm_url: "https://fcm.googleapis.com".to_string(),
            send_concurrency: 32,
        }
    }

    fn send_url(&self) -> String {
        format!("{}/v1/projects/{}/messages:send", self.fcm_url, self.project_id)
    }
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Delivers `message` to every token in one batch call.
    /// `responses[i]` in the result belongs to `message.tokens[i]`.
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse, PushError>;
}

/// Firebase Cloud Messaging over the HTTP v1 API.
///
/// HTTP v1 has no multicast endpoint, so a batch is fanned out as one
/// `messages:send` per token (bounded by `send_concurrency`) and the
/// answers are folded back into a single `BatchResponse` in token order.
pub struct FcmPushProvider {
    config: FcmConfig,
    client: reqwest::Client,
    auth: AccessTokenSource,
}

#[derive(Debug, Deserialize)]
struct FcmSendResult {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    error: FcmErrorStatus,
}

#[derive(Debug, Deserialize)]
struct FcmErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

impl FcmErrorStatus {
    // FCM puts its own code (UNREGISTERED, SENDER_ID_MISMATCH, ...) in the
    // details; the canonical status is the fallback.
    fn code(&self) -> String {
        self.details
            .iter()
            .find_map(|detail| detail.get("errorCode").and_then(|c| c.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| self.status.clone())
    }
}

impl FcmPushProvider {
    pub fn new(config: FcmConfig, client: reqwest::Client, auth: AccessTokenSource) -> Self {
        Self { config, client, auth }
    }

    fn build_payload(message: &MulticastMessage, token: &str) -> serde_json::Value {
        let mut fcm_message = json!({
            "token": token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
        });

        if let Some(sound) = &message.android_sound {
            fcm_message["android"] = json!({ "notification": { "sound": sound } });
        }

        if !message.data.is_empty() {
            fcm_message["data"] = json!(message.data);
        }

        json!({ "message": fcm_message })
    }

    async fn send_one(&self, url: &str, bearer: &str, message: &MulticastMessage, token: &str) -> SendResponse {
        let payload = Self::build_payload(message, token);

        let response = match self.client.post(url).bearer_auth(bearer).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => return SendResponse::failed(SendError::new("NETWORK_ERROR", e.to_string())),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return match serde_json::from_str::<FcmSendResult>(&body) {
                Ok(result) => SendResponse::delivered(result.name),
                Err(_) => SendResponse::delivered(String::new()),
            };
        }

        let error = match serde_json::from_str::<FcmErrorBody>(&body) {
            Ok(parsed) => SendError::new(parsed.error.code(), parsed.error.message),
            Err(_) => SendError::new(status.as_u16().to_string(), body),
        };
        SendResponse::failed(error)
    }
}

#[async_trait]
impl PushProvider for FcmPushProvider {
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse, PushError> {
        if message.tokens.is_empty() {
            return Err(PushError::NoTokens);
        }

        // One credential fetch per batch; failing here fails the whole batch.
        let bearer = self.auth.bearer(&[FCM_SCOPE]).await?;
        let url = self.config.send_url();

        tracing::info!("Sending FCM notification to {} devices", message.tokens.len());

        let (url, bearer) = (url.as_str(), bearer.as_str());
        let responses: Vec<SendResponse> = stream::iter(message.tokens.clone())
            .map(|token| async move { self.send_one(url, bearer, message, &token).await })
            .buffered(self.config.send_concurrency.max(1))
            .collect()
            .await;

        Ok(BatchResponse::from_responses(responses))
    }
}

// Mock service for development and testing
#[derive(Debug, Default)]
pub struct MockPushProvider;

#[async_trait]
impl PushProvider for MockPushProvider {
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse, PushError> {
        tracing::info!(
            "[MOCK] Would send FCM to {} devices: {} - {}",
            message.tokens.len(),
            message.title,
            message.body
        );
        let responses = message
            .tokens
            .iter()
            .map(|_| SendResponse::delivered(generate_message_id()))
            .collect();
        Ok(BatchResponse::from_responses(responses))
    }
}
