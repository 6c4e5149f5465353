//! In-memory state store.
//!
//! Dashmap-backed implementation of the same store traits the SQLite
//! store implements. Used by the `--in-memory` run mode and as a
//! fixture-free backing in tests; sessions do not survive a restart.

use dashmap::DashMap;
use proctor_core::engine::{SessionStore, TokenStore};
use proctor_types::UserId;
use proctor_types::error::StoreError;
use proctor_types::session::{AuthSession, Session};

/// Volatile state store with the durability of a process lifetime.
#[derive(Default)]
pub struct InMemoryStateStore {
    sessions: DashMap<UserId, Session>,
    tokens: DashMap<UserId, AuthSession>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemoryStateStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions.insert(session.user_id, session.clone());
        Ok(())
    }

    async fn load(&self, user_id: UserId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.get(&user_id).map(|s| s.clone()))
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StoreError> {
        self.sessions.remove(&user_id);
        Ok(())
    }
}

impl TokenStore for InMemoryStateStore {
    async fn save_token(&self, session: &AuthSession) -> Result<(), StoreError> {
        self.tokens.insert(session.user_id, session.clone());
        Ok(())
    }

    async fn load_token(&self, user_id: UserId) -> Result<Option<AuthSession>, StoreError> {
        Ok(self.tokens.get(&user_id).map(|t| t.clone()))
    }

    async fn delete_token(&self, user_id: UserId) -> Result<(), StoreError> {
        self.tokens.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_session_roundtrip() {
        let store = InMemoryStateStore::new();
        let session = Session::new(1, 2, "register", json!({"step": "name"}));

        store.save(&session).await.unwrap();
        let loaded = store.load(1).await.unwrap().unwrap();
        assert_eq!(loaded.flow_id, "register");

        store.delete(1).await.unwrap();
        assert!(store.load(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tokens_are_independent_of_sessions() {
        let store = InMemoryStateStore::new();
        store
            .save_token(&AuthSession {
                user_id: 1,
                token: "t".to_string(),
            })
            .await
            .unwrap();

        store.delete(1).await.unwrap();
        assert!(store.load_token(1).await.unwrap().is_some());
    }
}
