use crate::errors::AppError;
use crate::models::AuthUser;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Resolves a bearer access token to the user it was issued for.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// `Unauthorized` when the token is missing, expired or revoked.
    async fn verify(&self, access_token: &str) -> Result<AuthUser, AppError>;
}

/// Client for a GoTrue-compatible auth server.
#[derive(Clone)]
pub struct RemoteSessionVerifier {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteSessionVerifier {
    /// Creates a new `RemoteSessionVerifier`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root URL of the auth server, without a trailing slash.
    /// * `api_key` - Project key sent in the `apikey` header, when required.
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create auth client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl SessionVerifier for RemoteSessionVerifier {
    async fn verify(&self, access_token: &str) -> Result<AuthUser, AppError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        tracing::debug!("Verifying session against {}", url);

        let mut request = self.client.get(&url).bearer_auth(access_token);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Auth request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Unauthorized(
                "Session is invalid or expired".to_string(),
            ));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Auth server returned {}: {}",
                status, error_text
            )));
        }

        let user: AuthUser = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse auth response: {}", e))
        })?;

        tracing::debug!("Session verified for user {}", user.id);
        Ok(user)
    }
}
