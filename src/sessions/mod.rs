//! Operator session store
//!
//! Keyed session records checked by the WebSocket gateway before a client
//! connection is accepted. Sessions are created by the login endpoint and
//! checked here for membership and expiry only.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// One authenticated operator session
#[derive(Debug, Clone)]
pub struct OperatorSession {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, OperatorSession>>,
    duration: Duration,
}

impl SessionStore {
    pub fn new(session_duration_hours: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            duration: Duration::hours(session_duration_hours as i64),
        }
    }

    /// Create a session for a user; returns the opaque session ID and expiry
    pub async fn create(&self, user_id: &str) -> (String, DateTime<Utc>) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let expires_at = Utc::now() + self.duration;

        self.sessions.write().await.insert(
            session_id.clone(),
            OperatorSession {
                user_id: user_id.to_string(),
                expires_at,
            },
        );

        (session_id, expires_at)
    }

    /// Check membership and expiry; expired entries are dropped on the spot
    pub async fn validate(&self, session_id: &str) -> bool {
        let expired = {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(session) => {
                    if session.expires_at > Utc::now() {
                        return true;
                    }
                    true // present but expired
                }
                None => false,
            }
        };

        if expired {
            self.sessions.write().await.remove(session_id);
        }
        false
    }

    /// Drop a session unconditionally
    pub async fn revoke(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_validate() {
        let store = SessionStore::new(1);
        let (id, expires_at) = store.create("operator@example.com").await;

        assert!(expires_at > Utc::now());
        assert!(store.validate(&id).await);
        assert!(!store.validate("bogus").await);
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_pruned() {
        let store = SessionStore::new(0);
        let (id, _) = store.create("operator@example.com").await;

        assert!(!store.validate(&id).await);
        // pruned on first failed validation
        assert!(store.sessions.read().await.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_revoke() {
        let store = SessionStore::new(1);
        let (id, _) = store.create("operator@example.com").await;

        store.revoke(&id).await;
        assert!(!store.validate(&id).await);
    }
}
