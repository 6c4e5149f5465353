//! Authenticated HTTP client for the education-management backend.
//!
//! Every bot user is authenticated against the backend individually via
//! the telegram-login endpoint: the client signs the decimal user id
//! with HMAC-SHA256 over the shared secret and exchanges it for a
//! bearer token, persisted through the `TokenStore`. Tokens expire
//! server-side at an unknown cadence, so each request carries a single
//! 401-refresh-retry: re-login, persist the new token, retry once.
//!
//! The shared secret is wrapped in [`secrecy::SecretString`] and never
//! appears in Debug output or logs.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info};

use proctor_core::engine::TokenStore;
use proctor_core::provider::{AdminApi, Grade, QueueDataProvider};
use proctor_types::error::{ApiError, StoreError};
use proctor_types::queue::{QueueDetail, QueueSummary};
use proctor_types::session::AuthSession;
use proctor_types::{EventId, UserId};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Backend API client, generic over where tokens are persisted.
pub struct ApiClient<T> {
    client: reqwest::Client,
    base_url: String,
    login_secret: SecretString,
    tokens: Arc<T>,
}

impl<T: TokenStore> ApiClient<T> {
    pub fn new(base_url: &str, login_secret: SecretString, tokens: Arc<T>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            login_secret,
            tokens,
        }
    }

    /// Base64 HMAC-SHA256 signature of the decimal user id.
    fn login_hash(&self, user_id: UserId) -> Result<String, ApiError> {
        let mut mac = HmacSha256::new_from_slice(self.login_secret.expose_secret().as_bytes())
            .map_err(|e| ApiError::Request(format!("invalid login secret: {e}")))?;
        mac.update(user_id.to_string().as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Exchange the signed user id for a fresh bearer token and persist
    /// it.
    async fn login(&self, user_id: UserId) -> Result<String, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct LoginRequest {
            user_id: UserId,
            hash: String,
        }

        #[derive(Deserialize)]
        struct LoginResponse {
            token: String,
        }

        let request = LoginRequest {
            user_id,
            hash: self.login_hash(user_id)?,
        };
        let response = self
            .client
            .post(format!("{}/api/auth/telegram-login", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            status if status.is_success() => {
                let body: LoginResponse = response
                    .json()
                    .await
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                self.tokens
                    .save_token(&AuthSession {
                        user_id,
                        token: body.token.clone(),
                    })
                    .await
                    .map_err(store_error)?;
                info!(user_id, "logged in against the backend");
                Ok(body.token)
            }
            status => Err(ApiError::Request(format!("login failed with status {status}"))),
        }
    }

    async fn token_for(&self, user_id: UserId) -> Result<String, ApiError> {
        if let Some(auth) = self.tokens.load_token(user_id).await.map_err(store_error)? {
            return Ok(auth.token);
        }
        self.login(user_id).await
    }

    async fn authorized_get(
        &self,
        path: &str,
        token: &str,
    ) -> Result<reqwest::Response, ApiError> {
        self.client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))
    }

    async fn authorized_post(
        &self,
        path: &str,
        token: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ApiError> {
        self.client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))
    }

    /// GET `path` as `user_id`, refreshing the token once on a 401.
    async fn get_json<D: DeserializeOwned>(
        &self,
        user_id: UserId,
        path: &str,
    ) -> Result<D, ApiError> {
        let token = self.token_for(user_id).await?;
        let mut response = self.authorized_get(path, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(user_id, path, "stale token, re-logging in");
            let token = self.login(user_id).await?;
            response = self.authorized_get(path, &token).await?;
        }

        match response.status() {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| ApiError::Decode(e.to_string())),
            status => Err(ApiError::Request(format!("unexpected status {status} for {path}"))),
        }
    }

    /// POST `body` to `path` as `user_id`, refreshing the token once on
    /// a 401. The response body is discarded.
    async fn post_json(
        &self,
        user_id: UserId,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(), ApiError> {
        let token = self.token_for(user_id).await?;
        let mut response = self.authorized_post(path, &token, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(user_id, path, "stale token, re-logging in");
            let token = self.login(user_id).await?;
            response = self.authorized_post(path, &token, body).await?;
        }

        match response.status() {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            status if status.is_success() => Ok(()),
            status => Err(ApiError::Request(format!("unexpected status {status} for {path}"))),
        }
    }
}

fn store_error(e: StoreError) -> ApiError {
    ApiError::Request(format!("token store error: {e}"))
}

impl<T: TokenStore> QueueDataProvider for ApiClient<T> {
    async fn queue_detail(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<QueueDetail, ApiError> {
        self.get_json(user_id, &format!("/api/queues/{event_id}")).await
    }

    async fn list_queues(&self, user_id: UserId) -> Result<Vec<QueueSummary>, ApiError> {
        self.get_json(user_id, "/api/queues").await
    }
}

impl<T: TokenStore> AdminApi for ApiClient<T> {
    async fn register_admin(&self, user_id: UserId, full_name: &str) -> Result<(), ApiError> {
        self.post_json(
            user_id,
            "/api/admins/register",
            &serde_json::json!({ "fullName": full_name }),
        )
        .await
    }

    async fn create_group(&self, user_id: UserId, name: &str) -> Result<(), ApiError> {
        self.post_json(user_id, "/api/groups", &serde_json::json!({ "name": name }))
            .await
    }

    async fn grade_participant(
        &self,
        user_id: UserId,
        event_id: EventId,
        participant_id: Uuid,
        grade: Grade,
    ) -> Result<(), ApiError> {
        self.post_json(
            user_id,
            &format!("/api/queues/{event_id}/participants/{participant_id}/grade"),
            &serde_json::json!({ "points": grade.points, "status": grade.status }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStateStore;

    fn client(secret: &str) -> ApiClient<InMemoryStateStore> {
        ApiClient::new(
            "http://localhost:5000/",
            SecretString::from(secret.to_string()),
            Arc::new(InMemoryStateStore::new()),
        )
    }

    #[test]
    fn test_login_hash_matches_reference_vector() {
        // HMAC-SHA256(key = "secret", msg = "42"), base64.
        let hash = client("secret").login_hash(42).unwrap();
        assert_eq!(hash, "k8Eh56pDeh4B48USxvDOPIIag5Al3KRAj4VhbeSq7nA=");
    }

    #[test]
    fn test_login_hash_depends_on_user_id() {
        let api = client("secret");
        assert_ne!(api.login_hash(1).unwrap(), api.login_hash(2).unwrap());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let api = client("secret");
        assert_eq!(api.base_url, "http://localhost:5000");
    }
}
