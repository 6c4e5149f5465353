//! SQLite state store implementation.
//!
//! Implements `SessionStore` and `TokenStore` from `proctor-core` using
//! sqlx with split read/write pools. The flow payload is stored as JSON
//! text and deserialized on read.

use chrono::Utc;
use proctor_core::engine::{SessionStore, TokenStore};
use proctor_types::UserId;
use proctor_types::error::StoreError;
use proctor_types::session::{AuthSession, Session};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore` and `TokenStore`.
pub struct SqliteStateStore {
    pool: DatabasePool,
}

impl SqliteStateStore {
    /// Create a new state store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    user_id: i64,
    chat_id: i64,
    flow_id: String,
    step_index: i64,
    state: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            chat_id: row.try_get("chat_id")?,
            flow_id: row.try_get("flow_id")?,
            step_index: row.try_get("step_index")?,
            state: row.try_get("state")?,
        })
    }

    fn into_session(self) -> Result<Session, StoreError> {
        let state: serde_json::Value = serde_json::from_str(&self.state)
            .map_err(|e| StoreError::Query(format!("invalid JSON state: {e}")))?;
        let step_index = usize::try_from(self.step_index)
            .map_err(|e| StoreError::Query(format!("invalid step index: {e}")))?;

        Ok(Session {
            user_id: self.user_id,
            chat_id: self.chat_id,
            flow_id: self.flow_id,
            step_index,
            state,
        })
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// SessionStore implementation
// ---------------------------------------------------------------------------

impl SessionStore for SqliteStateStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let state = serde_json::to_string(&session.state)
            .map_err(|e| StoreError::Query(format!("failed to encode state: {e}")))?;
        let step_index = i64::try_from(session.step_index)
            .map_err(|e| StoreError::Query(format!("step index out of range: {e}")))?;

        sqlx::query(
            "INSERT INTO conversation_sessions (user_id, chat_id, flow_id, step_index, state, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 chat_id = excluded.chat_id,
                 flow_id = excluded.flow_id,
                 step_index = excluded.step_index,
                 state = excluded.state,
                 updated_at = excluded.updated_at",
        )
        .bind(session.user_id)
        .bind(session.chat_id)
        .bind(&session.flow_id)
        .bind(step_index)
        .bind(state)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn load(&self, user_id: UserId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, chat_id, flow_id, step_index, state
             FROM conversation_sessions WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        match row {
            Some(row) => {
                let session = SessionRow::from_row(&row)
                    .map_err(query_error)?
                    .into_session()?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM conversation_sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TokenStore implementation
// ---------------------------------------------------------------------------

impl TokenStore for SqliteStateStore {
    async fn save_token(&self, session: &AuthSession) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO auth_sessions (user_id, token, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 token = excluded.token,
                 updated_at = excluded.updated_at",
        )
        .bind(session.user_id)
        .bind(&session.token)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn load_token(&self, user_id: UserId) -> Result<Option<AuthSession>, StoreError> {
        let row = sqlx::query("SELECT user_id, token FROM auth_sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => Ok(Some(AuthSession {
                user_id: row.try_get("user_id").map_err(query_error)?,
                token: row.try_get("token").map_err(query_error)?,
            })),
            None => Ok(None),
        }
    }

    async fn delete_token(&self, user_id: UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM auth_sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::database_url;
    use serde_json::json;

    async fn store() -> (SqliteStateStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.db");
        let url = database_url(&db_path.display().to_string());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteStateStore::new(pool), dir)
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let (store, _dir) = store().await;
        let session = Session::new(1, 2, "create_group", json!({"name": "IS-23-1"}));

        store.save(&session).await.unwrap();
        let loaded = store.load(1).await.unwrap().unwrap();

        assert_eq!(loaded.flow_id, "create_group");
        assert_eq!(loaded.chat_id, 2);
        assert_eq!(loaded.step_index, 0);
        assert_eq!(loaded.state, json!({"name": "IS-23-1"}));
    }

    #[tokio::test]
    async fn test_save_is_an_upsert() {
        let (store, _dir) = store().await;
        let mut session = Session::new(1, 2, "create_group", json!({}));
        store.save(&session).await.unwrap();

        session.step_index = 1;
        session.state = json!({"name": "IS-23-1"});
        store.save(&session).await.unwrap();

        let loaded = store.load(1).await.unwrap().unwrap();
        assert_eq!(loaded.step_index, 1);
        assert_eq!(loaded.state, json!({"name": "IS-23-1"}));
    }

    #[tokio::test]
    async fn test_load_missing_session_is_none() {
        let (store, _dir) = store().await;
        assert!(store.load(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _dir) = store().await;
        let session = Session::new(1, 2, "register", json!({}));
        store.save(&session).await.unwrap();

        store.delete(1).await.unwrap();
        assert!(store.load(1).await.unwrap().is_none());
        store.delete(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_tokens_survive_session_deletion() {
        let (store, _dir) = store().await;
        store
            .save_token(&AuthSession {
                user_id: 1,
                token: "bearer-abc".to_string(),
            })
            .await
            .unwrap();
        store.save(&Session::new(1, 2, "register", json!({}))).await.unwrap();

        store.delete(1).await.unwrap();

        let token = store.load_token(1).await.unwrap().unwrap();
        assert_eq!(token.token, "bearer-abc");
    }

    #[tokio::test]
    async fn test_token_refresh_replaces_the_stored_token() {
        let (store, _dir) = store().await;
        for token in ["first", "second"] {
            store
                .save_token(&AuthSession {
                    user_id: 7,
                    token: token.to_string(),
                })
                .await
                .unwrap();
        }

        let loaded = store.load_token(7).await.unwrap().unwrap();
        assert_eq!(loaded.token, "second");
    }
}
