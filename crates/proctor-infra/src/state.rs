//! Runtime-selectable state store backing.
//!
//! The engine is generic over its store, but the binary picks the
//! backing at runtime from a CLI flag. This enum gives the wiring code
//! one concrete type to name while delegating every call to the chosen
//! implementation.

use proctor_core::engine::{SessionStore, TokenStore};
use proctor_types::UserId;
use proctor_types::error::StoreError;
use proctor_types::session::{AuthSession, Session};

use crate::memory::InMemoryStateStore;
use crate::sqlite::SqliteStateStore;

pub enum StateStore {
    Sqlite(SqliteStateStore),
    Memory(InMemoryStateStore),
}

impl SessionStore for StateStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        match self {
            Self::Sqlite(store) => store.save(session).await,
            Self::Memory(store) => store.save(session).await,
        }
    }

    async fn load(&self, user_id: UserId) -> Result<Option<Session>, StoreError> {
        match self {
            Self::Sqlite(store) => store.load(user_id).await,
            Self::Memory(store) => store.load(user_id).await,
        }
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StoreError> {
        match self {
            Self::Sqlite(store) => store.delete(user_id).await,
            Self::Memory(store) => store.delete(user_id).await,
        }
    }
}

impl TokenStore for StateStore {
    async fn save_token(&self, session: &AuthSession) -> Result<(), StoreError> {
        match self {
            Self::Sqlite(store) => store.save_token(session).await,
            Self::Memory(store) => store.save_token(session).await,
        }
    }

    async fn load_token(&self, user_id: UserId) -> Result<Option<AuthSession>, StoreError> {
        match self {
            Self::Sqlite(store) => store.load_token(user_id).await,
            Self::Memory(store) => store.load_token(user_id).await,
        }
    }

    async fn delete_token(&self, user_id: UserId) -> Result<(), StoreError> {
        match self {
            Self::Sqlite(store) => store.delete_token(user_id).await,
            Self::Memory(store) => store.delete_token(user_id).await,
        }
    }
}
