// src/state.rs
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    errors::{NotifierError, NotifierResult},
    services::{
        auth_service::AccessTokenSource,
        dispatch_service::{DEFAULT_LOOKUP_CONCURRENCY, Dispatcher},
        firestore_store::{FirestoreConfig, FirestoreRecipientStore},
        messaging_service::{FcmConfig, FcmPushProvider, MockPushProvider, PushProvider},
        realtime_store::RealtimeRecipientStore,
        recipient_service::{MemoryRecipientStore, RecipientStore},
    },
    telemetry::LogFormat,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Realtime,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "realtime" | "rtdb" => Ok(StoreBackend::Realtime),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown recipient store '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushBackend {
    Fcm,
    Mock,
}

impl FromStr for PushBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fcm" => Ok(PushBackend::Fcm),
            "mock" => Ok(PushBackend::Mock),
            other => Err(format!("unknown push provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub project_id: Option<String>,
    pub ride_requests_collection: String,
    pub driver_tokens_collection: String,
    pub drivers_collection: String,
    pub recipient_store: StoreBackend,
    pub firestore_emulator_host: Option<String>,
    pub firebase_database_url: Option<String>,
    pub firebase_auth_token: Option<String>,
    pub memory_store_seed: Option<String>,
    pub push_provider: Option<PushBackend>, // None: FCM when a project is configured, mock otherwise
    pub fcm_access_token: Option<String>,
    pub lookup_concurrency: usize,
    pub send_concurrency: usize,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> NotifierResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> NotifierResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        fn parsed<T>(key: &str, raw: Option<String>, default: T) -> NotifierResult<T>
        where
            T: FromStr,
            T::Err: std::fmt::Display,
        {
            match raw {
                Some(raw) => raw
                    .parse::<T>()
                    .map_err(|e| NotifierError::invalid_config(format!("{}={}: {}", key, raw, e))),
                None => Ok(default),
            }
        }

        let push_provider = match get("PUSH_PROVIDER") {
            Some(raw) => Some(parsed("PUSH_PROVIDER", Some(raw), PushBackend::Mock)?),
            None => None,
        };

        let config = Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed("PORT", get("PORT"), 8080)?,
            log_format: parsed("LOG_FORMAT", get("LOG_FORMAT"), LogFormat::default())?,
            project_id: get("GOOGLE_CLOUD_PROJECT").or_else(|| get("FIREBASE_PROJECT_ID")),
            ride_requests_collection: get("RIDE_REQUESTS_COLLECTION").unwrap_or_else(|| "ride_requests".to_string()),
            driver_tokens_collection: get("DRIVER_TOKENS_COLLECTION").unwrap_or_else(|| "driverTokens".to_string()),
            drivers_collection: get("DRIVERS_COLLECTION").unwrap_or_else(|| "drivers".to_string()),
            recipient_store: parsed("RECIPIENT_STORE", get("RECIPIENT_STORE"), StoreBackend::Firestore)?,
            firestore_emulator_host: get("FIRESTORE_EMULATOR_HOST"),
            firebase_database_url: get("FIREBASE_DATABASE_URL"),
            firebase_auth_token: get("FIREBASE_AUTH_TOKEN"),
            memory_store_seed: get("MEMORY_STORE_SEED"),
            push_provider,
            fcm_access_token: get("FCM_ACCESS_TOKEN"),
            lookup_concurrency: parsed("PROFILE_LOOKUP_CONCURRENCY", get("PROFILE_LOOKUP_CONCURRENCY"), DEFAULT_LOOKUP_CONCURRENCY)?,
            send_concurrency: parsed("FCM_SEND_CONCURRENCY", get("FCM_SEND_CONCURRENCY"), 32)?,
            http_timeout_secs: parsed("HTTP_TIMEOUT_SECS", get("HTTP_TIMEOUT_SECS"), 30)?,
        };

        if config.lookup_concurrency == 0 || config.send_concurrency == 0 {
            return Err(NotifierError::invalid_config("concurrency limits must be greater than zero"));
        }
        if config.http_timeout_secs == 0 {
            return Err(NotifierError::invalid_config("HTTP_TIMEOUT_SECS must be greater than zero"));
        }
        if config.recipient_store == StoreBackend::Realtime && config.firebase_database_url.is_none() {
            return Err(NotifierError::missing_env("FIREBASE_DATABASE_URL"));
        }

        Ok(config)
    }
}

/// Google credentials, fetched the first time something needs them.
#[derive(Default)]
struct Credentials {
    google: Option<AccessTokenSource>,
}

impl Credentials {
    async fn google(&mut self) -> NotifierResult<AccessTokenSource> {
        if let Some(source) = &self.google {
            return Ok(source.clone());
        }
        let source = AccessTokenSource::application_default()
            .await
            .map_err(|e| NotifierError::Authentication(e.to_string()))?;
        self.google = Some(source.clone());
        Ok(source)
    }

    async fn project_id(&mut self, config: &AppConfig) -> NotifierResult<String> {
        if let Some(project_id) = &config.project_id {
            return Ok(project_id.clone());
        }
        self.google()
            .await?
            .project_id()
            .await
            .ok_or_else(|| NotifierError::missing_env("GOOGLE_CLOUD_PROJECT"))
    }
}

/// Process-wide state, built once at startup and shared by every request.
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: AppConfig,
}

impl AppState {
    pub async fn new(config: AppConfig) -> NotifierResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        let mut credentials = Credentials::default();

        let store = Self::build_store(&config, &client, &mut credentials).await?;
        let provider = Self::build_provider(&config, &client, &mut credentials).await?;

        let dispatcher = Dispatcher::new(store, provider).with_lookup_concurrency(config.lookup_concurrency);

        Ok(Self::with_dispatcher(dispatcher, config))
    }

    /// State around an already assembled dispatcher (tests, embedding).
    pub fn with_dispatcher(dispatcher: Dispatcher, config: AppConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            config,
        }
    }

    async fn build_store(
        config: &AppConfig,
        client: &reqwest::Client,
        credentials: &mut Credentials,
    ) -> NotifierResult<Arc<dyn RecipientStore>> {
        match config.recipient_store {
            StoreBackend::Firestore => {
                let project_id = credentials.project_id(config).await?;
                let auth = match &config.firestore_emulator_host {
                    // The emulator treats "owner" as an admin token.
                    Some(_) => AccessTokenSource::Static("owner".to_string()),
                    None => credentials.google().await?,
                };
                tracing::info!("Using Firestore recipient store for project {}", project_id);
                let store = FirestoreRecipientStore::new(
                    FirestoreConfig {
                        project_id,
                        tokens_collection: config.driver_tokens_collection.clone(),
                        drivers_collection: config.drivers_collection.clone(),
                        emulator_host: config.firestore_emulator_host.clone(),
                    },
                    client.clone(),
                    auth,
                )?;
                Ok(Arc::new(store))
            }
            StoreBackend::Realtime => {
                let url = config
                    .firebase_database_url
                    .as_deref()
                    .ok_or_else(|| NotifierError::missing_env("FIREBASE_DATABASE_URL"))?;
                tracing::info!("Using Realtime Database recipient store at {}", url);
                let store = RealtimeRecipientStore::new(
                    url,
                    config.firebase_auth_token.as_deref(),
                    config.driver_tokens_collection.clone(),
                    config.drivers_collection.clone(),
                )?;
                Ok(Arc::new(store))
            }
            StoreBackend::Memory => {
                let store = match &config.memory_store_seed {
                    Some(path) => MemoryRecipientStore::from_seed_file(path).await?,
                    None => {
                        tracing::warn!("MEMORY_STORE_SEED not set, memory recipient store starts empty");
                        MemoryRecipientStore::new()
                    }
                };
                Ok(Arc::new(store))
            }
        }
    }

    async fn build_provider(
        config: &AppConfig,
        client: &reqwest::Client,
        credentials: &mut Credentials,
    ) -> NotifierResult<Arc<dyn PushProvider>> {
        let backend = match config.push_provider {
            Some(backend) => backend,
            None if config.project_id.is_some() => PushBackend::Fcm,
            None => {
                tracing::warn!("No project configured, using mock push provider");
                PushBackend::Mock
            }
        };

        match backend {
            PushBackend::Fcm => {
                let project_id = credentials.project_id(config).await?;
                let auth = match &config.fcm_access_token {
                    Some(token) => AccessTokenSource::Static(token.clone()),
                    None => credentials.google().await?,
                };
                let fcm_config = FcmConfig {
                    send_concurrency: config.send_concurrency,
                    ..FcmConfig::new(project_id)
                };
                Ok(Arc::new(FcmPushProvider::new(fcm_config, client.clone(), auth)))
            }
            PushBackend::Mock => Ok(Arc::new(MockPushProvider)),
        }
    }
}
