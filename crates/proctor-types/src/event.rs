//! The inbound event model: the two input channels of the bot.
//!
//! Every update from the chat transport is normalized into an
//! [`InboundEvent`] before it reaches the router, so flow handlers and
//! the queue controller never touch transport types.

use serde::{Deserialize, Serialize};

use crate::{ChatId, MessageId, UserId};

/// What the user actually did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A free-text reply.
    Text(String),
    /// A discrete button press carrying its raw callback payload.
    Button(String),
}

/// One normalized inbound chat event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub chat_id: ChatId,
    /// The message the event relates to: for button presses, the
    /// message carrying the keyboard that was pressed.
    pub message_id: MessageId,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn text(user_id: UserId, chat_id: ChatId, message_id: MessageId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            chat_id,
            message_id,
            kind: EventKind::Text(text.into()),
        }
    }

    pub fn button(user_id: UserId, chat_id: ChatId, message_id: MessageId, callback: impl Into<String>) -> Self {
        Self {
            user_id,
            chat_id,
            message_id,
            kind: EventKind::Button(callback.into()),
        }
    }

    /// The text payload, if this is a free-text event.
    pub fn message_text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Text(text) => Some(text),
            EventKind::Button(_) => None,
        }
    }

    /// The raw callback payload, if this is a button press.
    pub fn callback_text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Button(data) => Some(data),
            EventKind::Text(_) => None,
        }
    }
}
