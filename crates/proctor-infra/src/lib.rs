//! Infrastructure implementations for Proctor.
//!
//! Everything behind the proctor-core ports lives here: the SQLite and
//! in-memory state stores, the authenticated backend API client, the
//! Telegram HTTP messenger, and the SSE upstream channel.

pub mod api;
pub mod memory;
pub mod sqlite;
pub mod sse;
pub mod state;
pub mod telegram;
