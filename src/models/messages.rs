// src/models/messages.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::ride::RideRequest;

pub const NEW_RIDE_TITLE: &str = "New Ride Request";
pub const DEFAULT_SOUND: &str = "default";

/// One notification addressed to many device tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticastMessage {
    pub title: String,
    pub body: String,
    pub android_sound: Option<String>, // Audible alert hint for Android devices
    pub data: BTreeMap<String, String>,
    pub tokens: Vec<String>,
}

impl MulticastMessage {
    pub fn new(title: &str, body: &str, tokens: Vec<String>) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            android_sound: None,
            data: BTreeMap::new(),
            tokens,
        }
    }

    /// The "new ride" alert sent to every eligible driver.
    pub fn new_ride_request(ride: &RideRequest, tokens: Vec<String>) -> Self {
        let body = format!("Pickup: {}, Dropoff: {}", ride.pickup, ride.dropoff);
        Self::new(NEW_RIDE_TITLE, &body, tokens)
            .with_android_sound(DEFAULT_SOUND)
            .with_data("rideId", &ride.id)
    }

    pub fn with_android_sound(mut self, sound: &str) -> Self {
        self.android_sound = Some(sound.to_string());
        self
    }

    pub fn with_data(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendError {
    pub code: String,
    pub message: String,
}

impl SendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Outcome for a single token; `responses[i]` belongs to `tokens[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResponse {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<SendError>,
}

impl SendResponse {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self { success: true, message_id: Some(message_id.into()), error: None }
    }

    pub fn failed(error: SendError) -> Self {
        Self { success: false, message_id: None, error: Some(error) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<SendResponse>,
}

impl BatchResponse {
    pub fn from_responses(responses: Vec<SendResponse>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: responses.len() - success_count,
            responses,
        }
    }
}
