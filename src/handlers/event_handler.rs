// src/handlers/event_handler.rs
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    models::ride::RideRequestEvent,
    services::dispatch_service::DispatchReport,
    state::AppState,
    utils::firestore::{DocumentEventData, document_id},
};

pub const FIRESTORE_CREATED: &str = "google.cloud.firestore.document.v1.created";

/// Body of every event response. Always sent with `200 OK` so the event
/// source does not re-deliver.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum EventResponse {
    Dispatched(DispatchReport),
    Ignored { outcome: &'static str, reason: String },
}

impl EventResponse {
    fn ignored(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::info!("Ignoring event: {}", reason);
        EventResponse::Ignored { outcome: "ignored", reason }
    }
}

#[derive(Debug)]
pub enum FirestoreDelivery {
    Created(RideRequestEvent),
    Ignored(String),
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Turns an Eventarc (CloudEvents binary mode) Firestore delivery into a
/// ride request event. Only creations inside `collection` are kept.
pub fn decode_firestore_event(headers: &HeaderMap, body: &[u8], collection: &str) -> FirestoreDelivery {
    if let Some(event_type) = header(headers, "ce-type") {
        if event_type != FIRESTORE_CREATED {
            return FirestoreDelivery::Ignored(format!("unsupported event type {}", event_type));
        }
    }

    let data: DocumentEventData = if body.iter().all(u8::is_ascii_whitespace) {
        DocumentEventData::default()
    } else {
        match serde_json::from_slice(body) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Undecodable Firestore event body: {}", e);
                return FirestoreDelivery::Ignored(format!("undecodable body: {}", e));
            }
        }
    };

    if data.old_value.is_some() {
        return FirestoreDelivery::Ignored("not a create event".to_string());
    }

    // ce-subject looks like "documents/ride_requests/{rideId}".
    let subject = header(headers, "ce-subject").unwrap_or_default();
    let path = match &data.value {
        Some(document) if !document.name.is_empty() => document.relative_path(),
        _ => subject.strip_prefix("documents/"),
    };

    let ride_id = match path {
        Some(path) => match top_level_id(path, collection) {
            Some(id) => id.to_string(),
            None => return FirestoreDelivery::Ignored(format!("{} is not a {} document", path, collection)),
        },
        None => document_id(subject).unwrap_or_default().to_string(),
    };

    let fields = data.value.map(|document| document.plain_fields());
    FirestoreDelivery::Created(RideRequestEvent::new(ride_id, fields))
}

/// `{collection}/{id}` only; subcollection documents with the same
/// collection name do not match.
fn top_level_id<'a>(path: &'a str, collection: &str) -> Option<&'a str> {
    match path.split_once('/') {
        Some((parent, id)) if parent == collection && !id.is_empty() && !id.contains('/') => Some(id),
        _ => None,
    }
}

pub async fn firestore_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<EventResponse> {
    match decode_firestore_event(&headers, &body, &state.config.ride_requests_collection) {
        FirestoreDelivery::Created(event) => Json(EventResponse::Dispatched(state.dispatcher.dispatch(&event).await)),
        FirestoreDelivery::Ignored(reason) => Json(EventResponse::ignored(reason)),
    }
}

/// Plain `{"rideId": ..., "fields": {...}}` deliveries from any webhook.
pub async fn ride_request_event(State(state): State<Arc<AppState>>, body: Bytes) -> Json<EventResponse> {
    let event: RideRequestEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => return Json(EventResponse::ignored(format!("undecodable body: {}", e))),
    };

    Json(EventResponse::Dispatched(state.dispatcher.dispatch(&event).await))
}
