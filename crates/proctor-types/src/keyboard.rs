//! Inline keyboard model and the callback wire format.
//!
//! The callback payload is `name:param` or `name:param:extra`, where
//! `extra` carries a page number for paging callbacks. Queue participant
//! buttons use the name `queue_<eventId>` with the participant UUID as
//! the parameter.

use serde::{Deserialize, Serialize};

use crate::EventId;
use crate::error::QueueError;

/// One pressable button: visible text plus an opaque callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardButton {
    pub text: String,
    pub callback: String,
}

impl KeyboardButton {
    pub fn new(text: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback: callback.into(),
        }
    }
}

/// An inline keyboard: rows of buttons attached to one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<KeyboardButton>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; empty rows are dropped.
    pub fn push_row(&mut self, row: Vec<KeyboardButton>) {
        if !row.is_empty() {
            self.rows.push(row);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parsed `name:param[:extra]` callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackData {
    pub name: String,
    pub param: String,
    pub extra: Option<String>,
}

impl CallbackData {
    pub fn new(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: param.into(),
            extra: None,
        }
    }

    pub fn with_extra(name: impl Into<String>, param: impl Into<String>, extra: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: param.into(),
            extra: Some(extra.into()),
        }
    }

    /// Parse a raw callback payload. At least `name:param` is required.
    pub fn parse(raw: &str) -> Result<Self, QueueError> {
        let mut parts = raw.splitn(3, ':');
        let name = parts.next().unwrap_or_default();
        let Some(param) = parts.next() else {
            return Err(QueueError::MalformedCallback(raw.to_string()));
        };
        if name.is_empty() || param.is_empty() {
            return Err(QueueError::MalformedCallback(raw.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            param: param.to_string(),
            extra: parts.next().map(str::to_string),
        })
    }

    /// The `queue_<eventId>` name carried by participant buttons, if
    /// this callback is one.
    pub fn queue_event_id(&self) -> Option<EventId> {
        self.name.strip_prefix("queue_")?.parse().ok()
    }
}

impl std::fmt::Display for CallbackData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.extra {
            Some(extra) => write!(f, "{}:{}:{}", self.name, self.param, extra),
            None => write!(f, "{}:{}", self.name, self.param),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_without_extra() {
        let data = CallbackData::new("confirm_create_group", "yes");
        let parsed = CallbackData::parse(&data.to_string()).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn test_roundtrip_with_extra() {
        let data = CallbackData::with_extra("page", "queue_2", "3");
        let parsed = CallbackData::parse(&data.to_string()).unwrap();
        assert_eq!(parsed.extra.as_deref(), Some("3"));
    }

    #[test]
    fn test_parse_rejects_missing_param() {
        assert!(CallbackData::parse("lonely").is_err());
        assert!(CallbackData::parse("name:").is_err());
        assert!(CallbackData::parse(":param").is_err());
    }

    #[test]
    fn test_queue_event_id() {
        let data = CallbackData::parse("queue_2:01990041-ad21-792d-a63d-1d6c86063b19").unwrap();
        assert_eq!(data.queue_event_id(), Some(2));

        let other = CallbackData::parse("page:queue_2:1").unwrap();
        assert_eq!(other.queue_event_id(), None);
    }

    #[test]
    fn test_keyboard_drops_empty_rows() {
        let mut kb = Keyboard::new();
        kb.push_row(vec![]);
        kb.push_row(vec![KeyboardButton::new("Ok", "ok:1")]);
        assert_eq!(kb.rows.len(), 1);
    }
}
