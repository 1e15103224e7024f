use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use ride_request_notifier::{
    handlers::router,
    models::messages::{BatchResponse, MulticastMessage, SendError, SendResponse},
    services::{
        dispatch_service::Dispatcher,
        messaging_service::{PushError, PushProvider},
        recipient_service::{MemoryRecipientStore, MemorySeed},
    },
    state::{AppConfig, AppState},
};

/// Records every multicast and rejects tokens starting with "bad".
#[derive(Default)]
struct RecordingProvider {
    sent: Mutex<Vec<MulticastMessage>>,
}

#[async_trait]
impl PushProvider for RecordingProvider {
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse, PushError> {
        self.sent.lock().unwrap().push(message.clone());
        let responses = message
            .tokens
            .iter()
            .map(|token| {
                if token.starts_with("bad") {
                    SendResponse::failed(SendError {
                        code: "UNREGISTERED".to_string(),
                        message: "Requested entity was not found.".to_string(),
                    })
                } else {
                    SendResponse::delivered(format!("msg-{}", token))
                }
            })
            .collect();
        Ok(BatchResponse::from_responses(responses))
    }
}

fn app(provider: Arc<RecordingProvider>) -> axum::Router {
    let seed: MemorySeed = serde_json::from_value(json!({
        "driverTokens": {
            "driverA": {"token": "tA"},
            "driverB": {"token": "bad-tB"},
            "driverC": {"token": "tC"},
            "driverD": {"token": ""}
        },
        "drivers": {
            "driverA": {"notificationsEnabled": true},
            "driverB": {"notificationsEnabled": true},
            "driverC": {"notificationsEnabled": false},
            "driverD": {"notificationsEnabled": true}
        }
    }))
    .unwrap();
    let store = Arc::new(MemoryRecipientStore::from_seed(seed));
    let dispatcher = Dispatcher::new(store, provider);
    let config = AppConfig::from_lookup(|key| (key == "RECIPIENT_STORE").then(|| "memory".to_string())).unwrap();
    router(Arc::new(AppState::with_dispatcher(dispatcher, config)))
}

async fn post(app: axum::Router, uri: &str, headers: &[(&str, &str)], body: Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = app
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let response = app(Arc::default())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_pending_ride_notifies_enabled_drivers() {
    let provider = Arc::new(RecordingProvider::default());
    let (status, body) = post(
        app(provider.clone()),
        "/events/ride-request",
        &[],
        json!({"rideId": "r1", "fields": {"status": "pending", "pickup": "Airport", "dropoff": "Mall"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "delivered");
    assert_eq!(body["ride_id"], "r1");
    assert_eq!(body["recipients"], 2);
    assert_eq!(body["success_count"], 1);
    assert_eq!(body["failures"][0]["token"], "bad-tB");

    let sent = provider.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tokens, vec!["tA".to_string(), "bad-tB".to_string()]);
    assert_eq!(sent[0].title, "New Ride Request");
    assert_eq!(sent[0].body, "Pickup: Airport, Dropoff: Mall");
}

#[tokio::test]
async fn test_accepted_ride_is_skipped() {
    let provider = Arc::new(RecordingProvider::default());
    let (status, body) = post(
        app(provider.clone()),
        "/events/ride-request",
        &[],
        json!({"rideId": "r2", "fields": {"status": "accepted", "pickup": "A", "dropoff": "B"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "skipped");
    assert_eq!(body["reason"], "not_pending");
    assert!(provider.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_firestore_create_event() {
    let provider = Arc::new(RecordingProvider::default());
    let (status, body) = post(
        app(provider.clone()),
        "/events/firestore",
        &[
            ("ce-type", "google.cloud.firestore.document.v1.created"),
            ("ce-subject", "documents/ride_requests/r3"),
        ],
        json!({
            "value": {
                "name": "projects/demo/databases/(default)/documents/ride_requests/r3",
                "fields": {
                    "status": {"stringValue": "pending"},
                    "pickup": {"stringValue": "Legon"},
                    "dropoff": {"mapValue": {"fields": {"address": {"stringValue": "Tema"}}}}
                }
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ride_id"], "r3");
    assert_eq!(body["outcome"], "delivered");
    let sent = provider.sent.lock().unwrap();
    assert_eq!(sent[0].body, "Pickup: Legon, Dropoff: Tema");
    assert_eq!(sent[0].data.get("rideId").map(String::as_str), Some("r3"));
}

#[tokio::test]
async fn test_undecodable_bodies_still_answer_ok() {
    let provider = Arc::new(RecordingProvider::default());
    let (status, body) = post(app(provider.clone()), "/events/ride-request", &[], json!([1, 2, 3])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
    assert!(provider.sent.lock().unwrap().is_empty());
}
