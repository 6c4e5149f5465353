//! Telegram update wire types and their normalization.
//!
//! The rest of the system only ever sees [`InboundEvent`]; the raw
//! update shapes live here and nowhere else. Updates that carry neither
//! usable text nor a callback (stickers, edits, joins) normalize to
//! `None` and are skipped by the poller.

use proctor_types::event::InboundEvent;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TgMessage>,
    #[serde(default)]
    pub callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TgUser>,
    pub chat: TgChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TgCallbackQuery {
    pub id: String,
    pub from: TgUser,
    #[serde(default)]
    pub message: Option<TgMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TgUser {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

/// Map one raw update to a normalized event, if it carries one.
///
/// For callback queries the event's `message_id` is the message holding
/// the pressed keyboard, which is what edit-in-place needs.
pub fn normalize_update(update: &TgUpdate) -> Option<InboundEvent> {
    if let Some(callback) = &update.callback_query {
        let message = callback.message.as_ref()?;
        let data = callback.data.as_ref()?;
        return Some(InboundEvent::button(
            callback.from.id,
            message.chat.id,
            message.message_id,
            data.clone(),
        ));
    }

    let message = update.message.as_ref()?;
    let from = message.from.as_ref()?;
    let text = message.text.as_ref()?;
    Some(InboundEvent::text(
        from.id,
        message.chat.id,
        message.message_id,
        text.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_types::event::EventKind;

    #[test]
    fn test_text_message_normalizes() {
        let raw = r#"{
            "update_id": 10,
            "message": {
                "message_id": 55,
                "from": {"id": 7},
                "chat": {"id": 7},
                "text": "/queues"
            }
        }"#;
        let update: TgUpdate = serde_json::from_str(raw).unwrap();
        let event = normalize_update(&update).unwrap();

        assert_eq!(event.user_id, 7);
        assert_eq!(event.message_id, 55);
        assert_eq!(event.kind, EventKind::Text("/queues".to_string()));
    }

    #[test]
    fn test_callback_query_normalizes_to_button() {
        let raw = r#"{
            "update_id": 11,
            "callback_query": {
                "id": "abc",
                "from": {"id": 7},
                "message": {"message_id": 55, "chat": {"id": 7}},
                "data": "page:queue_5:1"
            }
        }"#;
        let update: TgUpdate = serde_json::from_str(raw).unwrap();
        let event = normalize_update(&update).unwrap();

        assert_eq!(event.message_id, 55, "button events point at the keyboard message");
        assert_eq!(event.kind, EventKind::Button("page:queue_5:1".to_string()));
    }

    #[test]
    fn test_textless_update_is_skipped() {
        let raw = r#"{
            "update_id": 12,
            "message": {"message_id": 56, "from": {"id": 7}, "chat": {"id": 7}}
        }"#;
        let update: TgUpdate = serde_json::from_str(raw).unwrap();
        assert!(normalize_update(&update).is_none());
    }
}
