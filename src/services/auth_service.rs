// src/services/auth_service.rs
use std::fmt;
use std::sync::Arc;

use gcp_auth::TokenProvider;
use thiserror::Error;

pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to initialize Google credentials: {0}")]
    Init(String),

    #[error("failed to obtain access token: {0}")]
    Token(String),
}

/// Where outbound Google API calls get their bearer token from.
#[derive(Clone)]
pub enum AccessTokenSource {
    /// Application Default Credentials (metadata server, service account
    /// key file, or gcloud user credentials).
    Google(Arc<dyn TokenProvider>),
    /// Pre-issued token, mainly for local runs and emulators.
    Static(String),
}

impl fmt::Debug for AccessTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessTokenSource::Google(_) => f.write_str("AccessTokenSource::Google"),
            AccessTokenSource::Static(_) => f.write_str("AccessTokenSource::Static(<redacted>)"),
        }
    }
}

impl AccessTokenSource {
    pub async fn application_default() -> Result<Self, AuthError> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| AuthError::Init(e.to_string()))?;
        Ok(AccessTokenSource::Google(provider))
    }

    /// Project the credentials belong to, when they carry one.
    pub async fn project_id(&self) -> Option<String> {
        match self {
            AccessTokenSource::Google(provider) => match provider.project_id().await {
                Ok(project_id) => Some(project_id.to_string()),
                Err(e) => {
                    tracing::debug!("Credentials carry no project id: {}", e);
                    None
                }
            },
            AccessTokenSource::Static(_) => None,
        }
    }

    pub async fn bearer(&self, scopes: &[&str]) -> Result<String, AuthError> {
        match self {
            AccessTokenSource::Google(provider) => {
                let token = provider
                    .token(scopes)
                    .await
                    .map_err(|e| AuthError::Token(e.to_string()))?;
                Ok(token.as_str().to_string())
            }
            AccessTokenSource::Static(token) => Ok(token.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let source = AccessTokenSource::Static("abc".to_string());
        assert_eq!(source.bearer(&[FCM_SCOPE]).await.unwrap(), "abc");
        assert_eq!(source.bearer(&[DATASTORE_SCOPE]).await.unwrap(), "abc");
        assert_eq!(source.project_id().await, None);
    }

    #[test]
    fn test_debug_redacts_static_token() {
        let source = AccessTokenSource::Static("secret".to_string());
        assert!(!format!("{:?}", source).contains("secret"));
    }
}
