//! Persistence ports for sessions and auth tokens.
//!
//! Both traits use RPITIT (native async fn in traits). Implementations
//! live in proctor-infra; the durable SQLite store and the in-memory
//! store are swappable without touching engine logic.

use std::future::Future;

use proctor_types::UserId;
use proctor_types::error::StoreError;
use proctor_types::session::{AuthSession, Session};

/// Keyed persistence for active conversation sessions, one per user.
pub trait SessionStore: Send + Sync {
    /// Insert or replace the session for its user (upsert).
    fn save(&self, session: &Session) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Load the active session, if any.
    fn load(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Delete the session. No-op if none exists.
    fn delete(&self, user_id: UserId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Keyed persistence for long-lived bearer tokens, one per user.
///
/// Independent lifecycle from conversation sessions: tokens are created
/// or refreshed lazily by the API client and never tied to a flow.
pub trait TokenStore: Send + Sync {
    fn save_token(
        &self,
        session: &AuthSession,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn load_token(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<AuthSession>, StoreError>> + Send;

    fn delete_token(&self, user_id: UserId)
    -> impl Future<Output = Result<(), StoreError>> + Send;
}
