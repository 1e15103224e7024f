// src/services/dispatch_service.rs
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

use crate::{
    models::{
        driver::{DriverProfile, DriverTokenRecord, RecipientSet},
        messages::MulticastMessage,
        ride::RideRequestEvent,
    },
    services::{
        messaging_service::PushProvider,
        recipient_service::{RecipientStore, StoreError},
    },
    utils::id_generator::generate_dispatch_id,
};

pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    NoPayload,
    NotPending { status: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenFailure {
    pub token: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub recipients: usize,
    pub success_count: usize,
    pub failures: Vec<TokenFailure>,
}

/// How one dispatch ended. Every variant is a successful run as far as the
/// event source is concerned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Skipped(SkipReason),
    NoRecipients,
    Delivered(DeliveryReport),
    ProviderFailed { error: String },
    StoreFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub dispatch_id: String,
    pub ride_id: String,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

/// Relays one "new ride request" notification to every eligible driver.
pub struct Dispatcher {
    store: Arc<dyn RecipientStore>,
    provider: Arc<dyn PushProvider>,
    lookup_concurrency: usize,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn RecipientStore>, provider: Arc<dyn PushProvider>) -> Self {
        Self {
            store,
            provider,
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
        }
    }

    pub fn with_lookup_concurrency(mut self, limit: usize) -> Self {
        self.lookup_concurrency = limit.max(1);
        self
    }

    /// Runs one dispatch. Never fails: every problem is logged and folded
    /// into the returned outcome so the event is not re-delivered.
    pub async fn dispatch(&self, event: &RideRequestEvent) -> DispatchReport {
        let dispatch_id = generate_dispatch_id();
        let span = tracing::info_span!("dispatch", ride_id = %event.ride_id, dispatch_id = %dispatch_id);
        let outcome = self.run(event).instrument(span).await;

        DispatchReport {
            dispatch_id,
            ride_id: event.ride_id.clone(),
            outcome,
        }
    }

    async fn run(&self, event: &RideRequestEvent) -> DispatchOutcome {
        let Some(ride) = event.ride_request() else {
            tracing::info!("No data associated with the event");
            return DispatchOutcome::Skipped(SkipReason::NoPayload);
        };

        if !ride.is_pending() {
            tracing::info!("Ride request is not pending (status: {:?}), skipping", ride.status.as_str());
            return DispatchOutcome::Skipped(SkipReason::NotPending {
                status: ride.status.to_string(),
            });
        }

        let recipients = match self.resolve_recipients().await {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::error!("Failed to resolve recipients: {}", e);
                return DispatchOutcome::StoreFailed { error: e.to_string() };
            }
        };

        if recipients.is_empty() {
            tracing::info!("No drivers available to notify");
            return DispatchOutcome::NoRecipients;
        }

        let message = MulticastMessage::new_ride_request(&ride, recipients.into_tokens());

        match self.provider.send_multicast(&message).await {
            Ok(batch) => {
                tracing::info!(
                    "Successfully sent notifications to {} of {} drivers",
                    batch.success_count,
                    message.tokens.len()
                );

                if batch.responses.len() != message.tokens.len() {
                    tracing::warn!(
                        "Provider returned {} responses for {} tokens",
                        batch.responses.len(),
                        message.tokens.len()
                    );
                }

                // A token without a response counts as failed.
                let failures: Vec<TokenFailure> = message
                    .tokens
                    .iter()
                    .enumerate()
                    .filter_map(|(i, token)| {
                        let error = match batch.responses.get(i) {
                            Some(response) if response.success => return None,
                            Some(response) => response
                                .error
                                .as_ref()
                                .map(ToString::to_string)
                                .unwrap_or_else(|| "unknown error".to_string()),
                            None => "no response from provider".to_string(),
                        };
                        Some(TokenFailure { token: token.clone(), error })
                    })
                    .collect();

                for failure in &failures {
                    tracing::error!("Token failed: {} -> {}", failure.token, failure.error);
                }

                DispatchOutcome::Delivered(DeliveryReport {
                    recipients: message.tokens.len(),
                    success_count: batch.success_count,
                    failures,
                })
            }
            Err(e) => {
                tracing::error!("Error sending notifications: {}", e);
                DispatchOutcome::ProviderFailed { error: e.to_string() }
            }
        }
    }

    /// Lists every token record and checks each driver's profile, at most
    /// `lookup_concurrency` lookups in flight. A failed lookup only drops
    /// that driver.
    async fn resolve_recipients(&self) -> Result<RecipientSet, StoreError> {
        let records = self.store.list_token_records().await?;
        tracing::debug!("Checking {} driver token records", records.len());

        let store = &self.store;
        let checked: Vec<(DriverTokenRecord, Option<DriverProfile>)> = stream::iter(records)
            .filter(|record| futures::future::ready(record.has_token()))
            .map(|record| async move {
                let profile = match store.get_driver_profile(&record.driver_id).await {
                    Ok(Some(profile)) => Some(profile),
                    Ok(None) => {
                        tracing::debug!("Driver {} has no profile, skipping", record.driver_id);
                        None
                    }
                    Err(e) => {
                        tracing::warn!("Profile lookup failed for driver {}: {}", record.driver_id, e);
                        None
                    }
                };
                (record, profile)
            })
            .buffered(self.lookup_concurrency)
            .collect()
            .await;

        let mut recipients = RecipientSet::new();
        for (record, profile) in &checked {
            recipients.consider(record, profile.as_ref());
        }
        Ok(recipients)
    }
}
