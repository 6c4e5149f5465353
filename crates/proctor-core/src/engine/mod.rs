//! The conversation engine: session lifecycle and event dispatch.

pub mod manager;
pub mod store;

pub use manager::ConversationManager;
pub use store::{SessionStore, TokenStore};
