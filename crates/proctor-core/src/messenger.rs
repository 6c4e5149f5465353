//! The messaging endpoint port.
//!
//! `Messenger` is the bot's only way to talk back to users: send a new
//! message, or edit a previously sent one in place. Edits with identical
//! content are a no-op from the core's perspective.
//!
//! `BoxMessenger` provides dynamic dispatch for flow steps, which are
//! stored as trait objects and cannot be generic over the messenger.
//! Same blanket-impl pattern as the other Box* wrappers:
//! 1. Define an object-safe `MessengerDyn` trait with boxed futures
//! 2. Blanket-impl `MessengerDyn` for all `T: Messenger`
//! 3. `BoxMessenger` wraps `Box<dyn MessengerDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use proctor_types::error::MessengerError;
use proctor_types::keyboard::{Keyboard, KeyboardButton};
use proctor_types::{ChatId, MessageId};

/// Outbound messaging operations. Uses RPITIT (native async fn in
/// traits, Rust 2024 edition). Implementations live in proctor-infra.
pub trait Messenger: Send + Sync {
    /// Send a new message, returning the id the transport assigned to it.
    fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> impl Future<Output = Result<MessageId, MessengerError>> + Send;

    /// Replace the text (and keyboard) of a previously sent message.
    fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> impl Future<Output = Result<(), MessengerError>> + Send;

    /// Replace only the keyboard of a previously sent message.
    fn edit_message_markup(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        keyboard: Option<&Keyboard>,
    ) -> impl Future<Output = Result<(), MessengerError>> + Send;
}

// Lets the wiring code share one transport client between the boxed
// messenger and the poller.
impl<T: Messenger> Messenger for std::sync::Arc<T> {
    fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> impl Future<Output = Result<MessageId, MessengerError>> + Send {
        (**self).send_message(chat_id, text, keyboard)
    }

    fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> impl Future<Output = Result<(), MessengerError>> + Send {
        (**self).edit_message_text(chat_id, message_id, text, keyboard)
    }

    fn edit_message_markup(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        keyboard: Option<&Keyboard>,
    ) -> impl Future<Output = Result<(), MessengerError>> + Send {
        (**self).edit_message_markup(chat_id, message_id, keyboard)
    }
}

/// Build the standard two-button confirmation keyboard.
pub fn confirmation_keyboard(yes_callback: &str, no_callback: &str) -> Keyboard {
    let mut keyboard = Keyboard::new();
    keyboard.push_row(vec![
        KeyboardButton::new("\u{2705} Confirm", yes_callback),
        KeyboardButton::new("\u{274C} Cancel", no_callback),
    ]);
    keyboard
}

/// Object-safe version of [`Messenger`] with boxed futures.
///
/// Exists solely to enable dynamic dispatch; a blanket implementation
/// covers every `Messenger`.
pub trait MessengerDyn: Send + Sync {
    fn send_message_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        text: &'a str,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<MessageId, MessengerError>> + Send + 'a>>;

    fn edit_message_text_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &'a str,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<(), MessengerError>> + Send + 'a>>;

    fn edit_message_markup_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        message_id: MessageId,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<(), MessengerError>> + Send + 'a>>;
}

impl<T: Messenger> MessengerDyn for T {
    fn send_message_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        text: &'a str,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<MessageId, MessengerError>> + Send + 'a>> {
        Box::pin(self.send_message(chat_id, text, keyboard))
    }

    fn edit_message_text_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &'a str,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<(), MessengerError>> + Send + 'a>> {
        Box::pin(self.edit_message_text(chat_id, message_id, text, keyboard))
    }

    fn edit_message_markup_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        message_id: MessageId,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<(), MessengerError>> + Send + 'a>> {
        Box::pin(self.edit_message_markup(chat_id, message_id, keyboard))
    }
}

/// Type-erased messenger handed to flow steps and the engine.
pub struct BoxMessenger {
    inner: Box<dyn MessengerDyn>,
}

impl BoxMessenger {
    /// Wrap a concrete `Messenger` in a type-erased box.
    pub fn new<T: Messenger + 'static>(messenger: T) -> Self {
        Self {
            inner: Box::new(messenger),
        }
    }

    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, MessengerError> {
        self.inner.send_message_boxed(chat_id, text, keyboard).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError> {
        self.inner
            .edit_message_text_boxed(chat_id, message_id, text, keyboard)
            .await
    }

    pub async fn edit_message_markup(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError> {
        self.inner
            .edit_message_markup_boxed(chat_id, message_id, keyboard)
            .await
    }

    /// Send a prompt with the standard yes/no confirmation keyboard.
    pub async fn send_confirmation(
        &self,
        chat_id: ChatId,
        text: &str,
        yes_callback: &str,
        no_callback: &str,
    ) -> Result<MessageId, MessengerError> {
        let keyboard = confirmation_keyboard(yes_callback, no_callback);
        self.send_message(chat_id, text, Some(&keyboard)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every outbound call; used across the core test suites.
    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(ChatId, String)>>,
    }

    impl Messenger for RecordingMessenger {
        async fn send_message(
            &self,
            chat_id: ChatId,
            text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<MessageId, MessengerError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push((chat_id, text.to_string()));
            Ok(sent.len() as MessageId)
        }

        async fn edit_message_text(
            &self,
            _chat_id: ChatId,
            _message_id: MessageId,
            _text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), MessengerError> {
            Ok(())
        }

        async fn edit_message_markup(
            &self,
            _chat_id: ChatId,
            _message_id: MessageId,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), MessengerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_box_messenger_delegates() {
        let boxed = BoxMessenger::new(RecordingMessenger::default());
        let id = boxed.send_message(7, "hello", None).await.unwrap();
        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn test_send_confirmation_builds_two_buttons() {
        let keyboard = confirmation_keyboard("yes:1", "no:1");
        assert_eq!(keyboard.rows.len(), 1);
        assert_eq!(keyboard.rows[0].len(), 2);
        assert_eq!(keyboard.rows[0][0].callback, "yes:1");
        assert_eq!(keyboard.rows[0][1].callback, "no:1");
    }
}
