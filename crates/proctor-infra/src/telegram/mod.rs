//! Telegram Bot API transport.

pub mod client;
pub mod update;

pub use client::TelegramClient;
pub use update::normalize_update;
