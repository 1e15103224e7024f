// src/models/ride.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RideStatus {
    Pending,    // Waiting for a driver, the only status that triggers a dispatch
    Accepted,   // A driver took the ride
    InProgress, // Passenger picked up
    Completed,
    Cancelled,
    Other(String), // Anything the booking flow writes that we don't model
}

impl RideStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
            RideStatus::Other(raw) => raw,
        }
    }
}

impl From<&str> for RideStatus {
    // Exact match only: "Pending" or " pending" are not pending.
    fn from(raw: &str) -> Self {
        match raw {
            "pending" => RideStatus::Pending,
            "accepted" => RideStatus::Accepted,
            "in_progress" => RideStatus::InProgress,
            "completed" => RideStatus::Completed,
            "cancelled" => RideStatus::Cancelled,
            other => RideStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pickup or dropoff location as written by the booking flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Text(String),
    GeoPoint { latitude: f64, longitude: f64 },
    Structured(Map<String, Value>),
    Unspecified,
}

impl Location {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Location::Unspecified,
            Some(Value::String(text)) => Location::Text(text.clone()),
            Some(Value::Object(map)) => {
                let lat = map.get("latitude").and_then(Value::as_f64);
                let lng = map.get("longitude").and_then(Value::as_f64);
                match (lat, lng) {
                    (Some(latitude), Some(longitude)) if map.len() == 2 => {
                        Location::GeoPoint { latitude, longitude }
                    }
                    _ => Location::Structured(map.clone()),
                }
            }
            Some(other) => Location::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Text(text) => f.write_str(text),
            Location::GeoPoint { latitude, longitude } => write!(f, "{}, {}", latitude, longitude),
            Location::Structured(map) => {
                let label = ["address", "name"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str));
                match label {
                    Some(label) => f.write_str(label),
                    None => write!(f, "{}", Value::Object(map.clone())),
                }
            }
            Location::Unspecified => f.write_str("unknown"),
        }
    }
}

/// A newly created ride request, read-only to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct RideRequest {
    pub id: String,
    pub status: RideStatus,
    pub pickup: Location,
    pub dropoff: Location,
}

impl RideRequest {
    /// Builds a request from plain JSON fields. A missing or non-string
    /// status never reads as pending.
    pub fn from_fields(id: impl Into<String>, fields: &Map<String, Value>) -> Self {
        let status = match fields.get("status") {
            Some(Value::String(raw)) => RideStatus::from(raw.as_str()),
            Some(other) => RideStatus::Other(other.to_string()),
            None => RideStatus::Other(String::new()),
        };

        Self {
            id: id.into(),
            status,
            pickup: Location::from_value(fields.get("pickup")),
            dropoff: Location::from_value(fields.get("dropoff")),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RideStatus::Pending
    }
}

/// One "record created" delivery from the event source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequestEvent {
    pub ride_id: String,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
}

impl RideRequestEvent {
    pub fn new(ride_id: impl Into<String>, fields: Option<Map<String, Value>>) -> Self {
        Self { ride_id: ride_id.into(), fields }
    }

    pub fn ride_request(&self) -> Option<RideRequest> {
        self.fields
            .as_ref()
            .map(|fields| RideRequest::from_fields(self.ride_id.clone(), fields))
    }
}
