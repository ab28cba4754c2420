//! Platform session token manager
//!
//! Caches the bearer token obtained from the platform login endpoint.
//! Invalidation is reactive only: a 401 observed by a caller clears the
//! cache and the next use logs in again. Concurrent cold-start callers are
//! serialized behind a login mutex so the platform sees a single login.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::config::PlatformConfig;
use crate::error::PlatformError;

/// Cached bearer credential
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub value: String,
    pub obtained_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

pub struct SessionTokenManager {
    http_client: Client,
    base_url: String,
    username: String,
    password: String,
    token: RwLock<Option<SessionToken>>,
    login_gate: Mutex<()>,
}

impl SessionTokenManager {
    pub fn new(http_client: Client, config: &PlatformConfig) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            token: RwLock::new(None),
            login_gate: Mutex::new(()),
        }
    }

    /// Return the cached token, logging in first if none is cached.
    pub async fn get_token(&self) -> Result<String, PlatformError> {
        {
            let token = self.token.read().await;
            if let Some(ref t) = *token {
                return Ok(t.value.clone());
            }
        }

        // Serialize login attempts; re-check after acquisition so callers
        // queued behind an in-flight login reuse its result.
        let _gate = self.login_gate.lock().await;
        {
            let token = self.token.read().await;
            if let Some(ref t) = *token {
                return Ok(t.value.clone());
            }
        }

        let url = format!("{}/api/auth/login", self.base_url);
        let body = serde_json::json!({
            "username": self.username,
            "password": self.password,
        });

        let resp = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::Transport(format!("login request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(PlatformError::Unauthenticated(format!(
                "status {}",
                resp.status().as_u16()
            )));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| PlatformError::Transport(format!("login parse failed: {}", e)))?;

        let session = SessionToken {
            value: login.token.clone(),
            obtained_at: Utc::now(),
        };

        {
            let mut token = self.token.write().await;
            *token = Some(session);
        }

        tracing::info!("[Platform] Session token acquired");
        Ok(login.token)
    }

    /// Clear the cached token unconditionally
    pub async fn invalidate(&self) {
        let mut token = self.token.write().await;
        if let Some(stale) = token.take() {
            let age = Utc::now().signed_duration_since(stale.obtained_at);
            tracing::debug!(
                "[Platform] Session token invalidated (age: {}s)",
                age.num_seconds()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> PlatformConfig {
        PlatformConfig {
            base_url,
            username: "tenant@thingsboard.org".to_string(),
            password: "tenant".to_string(),
            request_timeout_secs: 5,
        }
    }

    fn manager(server: &MockServer) -> SessionTokenManager {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        SessionTokenManager::new(client, &test_config(server.uri()))
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(serde_json::json!({
                "username": "tenant@thingsboard.org",
                "password": "tenant",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"token": "tok-1"}))
                    .set_delay(Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mgr = manager(&server);
        let (a, b) = tokio::join!(mgr.get_token(), mgr.get_token());
        assert_eq!(a.unwrap(), "tok-1");
        assert_eq!(b.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_cached_token_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "tok-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mgr = manager(&server);
        assert_eq!(mgr.get_token().await.unwrap(), "tok-1");
        assert_eq!(mgr.get_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "tok-1"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let mgr = manager(&server);
        mgr.get_token().await.unwrap();
        mgr.invalidate().await;
        mgr.get_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_login_failure_is_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let mgr = manager(&server);
        match mgr.get_token().await {
            Err(PlatformError::Unauthenticated(_)) => {}
            other => panic!("expected Unauthenticated, got {:?}", other.err()),
        }
    }
}
