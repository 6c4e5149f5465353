//! Telegram Bot API client.
//!
//! Implements the core `Messenger` port over plain HTTPS calls
//! (`sendMessage`, `editMessageText`, `editMessageReplyMarkup`) plus the
//! long-poll `getUpdates` read side used by the poller. Messages are
//! sent with HTML parse mode; keyboards serialize to the inline keyboard
//! JSON shape.
//!
//! Telegram answers "message is not modified" with an error; edits with
//! unchanged content are treated as a no-op rather than a failure, which
//! keeps identical re-renders harmless.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use proctor_core::messenger::Messenger;
use proctor_types::error::MessengerError;
use proctor_types::keyboard::Keyboard;
use proctor_types::{ChatId, MessageId};

use super::update::TgUpdate;

#[derive(Debug, Deserialize)]
struct TgResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// HTTPS client for one bot token.
pub struct TelegramClient {
    client: reqwest::Client,
    /// `https://api.telegram.org/bot<token>` -- built once so the token
    /// is exposed exactly once.
    base_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: &SecretString, poll_timeout_secs: u64) -> Self {
        // The read timeout must outlive the long poll.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            base_url: format!("https://api.telegram.org/bot{}", bot_token.expose_secret()),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, MessengerError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| MessengerError::Api(format!("{method}: {e}")))?;

        let status = response.status();
        let parsed: TgResponse<T> = response
            .json()
            .await
            .map_err(|e| MessengerError::Api(format!("{method}: bad response body: {e}")))?;

        if !parsed.ok {
            let description = parsed.description.unwrap_or_else(|| status.to_string());
            return Err(MessengerError::Api(format!("{method}: {description}")));
        }
        parsed
            .result
            .ok_or_else(|| MessengerError::Api(format!("{method}: ok response without result")))
    }

    /// Long-poll for updates past `offset`. Returns an empty vec on
    /// timeout.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<TgUpdate>, MessengerError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    /// Ack a callback query so the client stops showing a spinner.
    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<(), MessengerError> {
        // answerCallbackQuery returns a bare boolean result.
        let _: bool = self
            .call("answerCallbackQuery", &json!({ "callback_query_id": callback_id }))
            .await?;
        Ok(())
    }

    fn is_not_modified(error: &MessengerError) -> bool {
        let MessengerError::Api(description) = error;
        description.contains("message is not modified")
    }
}

/// The inline keyboard JSON shape Telegram expects.
fn reply_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| json!({ "text": button.text, "callback_data": button.callback }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

impl Messenger for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, MessengerError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }
        let sent: SentMessage = self.call("sendMessage", &body).await?;
        Ok(sent.message_id)
    }

    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }
        match self.call::<Value>("editMessageText", &body).await {
            Ok(_) => Ok(()),
            Err(e) if Self::is_not_modified(&e) => {
                debug!(chat_id, message_id, "edit skipped, content unchanged");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn edit_message_markup(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }
        match self.call::<Value>("editMessageReplyMarkup", &body).await {
            Ok(_) => Ok(()),
            Err(e) if Self::is_not_modified(&e) => {
                debug!(chat_id, message_id, "markup edit skipped, content unchanged");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_types::keyboard::KeyboardButton;

    #[test]
    fn test_reply_markup_shape() {
        let mut keyboard = Keyboard::new();
        keyboard.push_row(vec![
            KeyboardButton::new("Ivanova Ada ⏳", "queue_5:abc"),
            KeyboardButton::new("▶️", "page:queue_5:1"),
        ]);

        let markup = reply_markup(&keyboard);

        assert_eq!(markup["inline_keyboard"][0][0]["text"], "Ivanova Ada ⏳");
        assert_eq!(markup["inline_keyboard"][0][1]["callback_data"], "page:queue_5:1");
    }

    #[test]
    fn test_not_modified_detection() {
        let err = MessengerError::Api(
            "editMessageText: Bad Request: message is not modified".to_string(),
        );
        assert!(TelegramClient::is_not_modified(&err));

        let other = MessengerError::Api("editMessageText: chat not found".to_string());
        assert!(!TelegramClient::is_not_modified(&other));
    }

    #[test]
    fn test_response_envelope_decodes_errors() {
        let raw = r#"{"ok": false, "description": "Unauthorized"}"#;
        let parsed: TgResponse<SentMessage> = serde_json::from_str(raw).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.description.as_deref(), Some("Unauthorized"));
    }
}
