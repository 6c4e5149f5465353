//! Shared domain types for Proctor.
//!
//! This crate contains the types used across the Proctor admin bot:
//! conversation sessions, queue subscriptions, the inbound event model,
//! the keyboard/callback wire format, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! secrecy.

pub mod config;
pub mod error;
pub mod event;
pub mod keyboard;
pub mod queue;
pub mod session;

/// Telegram user identifier.
pub type UserId = i64;

/// Telegram chat identifier (the destination for messages).
pub type ChatId = i64;

/// Telegram message identifier, unique within a chat.
pub type MessageId = i64;

/// Queue event identifier assigned by the backend.
pub type EventId = i64;
