//! Queue domain types: subscriptions, participants, and push updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EventId, MessageId, UserId};

/// "User X is watching a rendering of queue event Y, and that rendering
/// lives in message `message_id`."
///
/// One active subscription per user: re-subscribing to the same event
/// refreshes the message id in place, switching events replaces the
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSubscription {
    pub user_id: UserId,
    pub event_id: EventId,
    /// The message holding this user's live rendering of the queue.
    pub message_id: MessageId,
    /// Parent subject of the event, carried so a participant action can
    /// be filed under the right subject without another fetch.
    pub subject_id: i64,
    /// Human-readable label, e.g. "2025-09-12 -- Lab defence".
    pub event_name: String,
}

/// Where a participant currently stands in the queue.
///
/// The discriminants define the rendering order: people actively being
/// checked surface first, exhausted candidates last.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Checking = 0,
    Waiting = 1,
    Finished = 2,
    Skipped = 3,
}

impl ParticipantStatus {
    /// Emoji shown next to the participant's name.
    pub fn emoji(&self) -> &'static str {
        match self {
            ParticipantStatus::Checking => "\u{1F3AF}",
            ParticipantStatus::Waiting => "\u{23F3}",
            ParticipantStatus::Finished => "\u{1F3F3}\u{FE0F}",
            ParticipantStatus::Skipped => "\u{274C}",
        }
    }
}

/// One row of a queue event's participant list, as served by the
/// backend detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueParticipant {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub group_name: String,
    pub total_points: i32,
    pub status: ParticipantStatus,
    /// Group color as a hex string, mapped to a marker at render time.
    pub color: String,
    pub checking_by_admin_name: Option<String>,
}

impl QueueParticipant {
    /// Composite ordering key: status group first (checking before
    /// waiting before finished before skipped), then total points
    /// ascending, then last name for determinism across re-renders.
    pub fn sort_key(&self) -> (ParticipantStatus, i32, &str) {
        (self.status, self.total_points, self.last_name.as_str())
    }
}

/// Full detail of one queue event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDetail {
    pub event_id: EventId,
    pub event_name: String,
    pub event_date_time: DateTime<Utc>,
    pub subject_id: i64,
    pub participants: Vec<QueueParticipant>,
}

impl QueueDetail {
    /// Display label used for subscription records and list rows.
    pub fn display_name(&self) -> String {
        format!(
            "{} -- {}",
            self.event_date_time.format("%Y-%m-%d"),
            self.event_name
        )
    }
}

/// Summary row returned by the queue listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub event_id: EventId,
    pub event_name: String,
    pub event_date_time: DateTime<Utc>,
}

/// Server-pushed notification that one participant of one event changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePush {
    pub event_id: EventId,
    pub participant_id: Uuid,
    pub new_status: ParticipantStatus,
}
