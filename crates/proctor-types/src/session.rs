//! Conversation and auth session records.
//!
//! A `Session` is the persisted position of one user inside one flow.
//! The step payload is an opaque JSON blob so heterogeneous flow states
//! share one storage table; each flow decodes its own state through
//! [`Session::decode_state`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FlowError;
use crate::{ChatId, UserId};

/// Persisted per-user record of which flow is active, at which step,
/// with what accumulated state.
///
/// At most one `Session` exists per user at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Owning user (primary key).
    pub user_id: UserId,
    /// Destination chat for prompts.
    pub chat_id: ChatId,
    /// Identifier of the active flow definition, used to restore the
    /// right flow object after a restart.
    pub flow_id: String,
    /// 0-based index of the current step. In `[0, steps.len())` while
    /// the session is alive.
    pub step_index: usize,
    /// Flow-specific payload, serialized opaquely.
    pub state: Value,
}

impl Session {
    /// Create a session positioned at the first step of `flow_id`.
    pub fn new(user_id: UserId, chat_id: ChatId, flow_id: impl Into<String>, state: Value) -> Self {
        Self {
            user_id,
            chat_id,
            flow_id: flow_id.into(),
            step_index: 0,
            state,
        }
    }

    /// Decode the opaque payload into the flow's own state type.
    pub fn decode_state<T: serde::de::DeserializeOwned>(&self) -> Result<T, FlowError> {
        serde_json::from_value(self.state.clone())
            .map_err(|e| FlowError::State(format!("failed to decode flow state: {e}")))
    }
}

/// Long-lived bearer token for one user, independent of any flow.
///
/// Created or refreshed lazily on the first authenticated call or on a
/// 401 response from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: UserId,
    pub token: String,
}
