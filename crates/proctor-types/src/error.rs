use thiserror::Error;

use crate::EventId;

/// Errors from the session/token store (used by trait definitions in
/// proctor-core).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors related to conversation flow handling.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A flow was started while another one is active for the same user.
    /// Callers must finish the stale session first, never overwrite it.
    #[error("user {0} already has an active conversation")]
    Conflict(i64),

    /// The persisted session names a flow the registry cannot build
    /// (for example an ad-hoc flow lost over a restart).
    #[error("unknown flow '{0}'")]
    UnknownFlow(String),

    #[error("session state error: {0}")]
    State(String),

    /// A step handler failed. Caught at the dispatch boundary; the
    /// session is reset and the user is told.
    #[error("step handler error: {0}")]
    Handler(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Messenger(#[from] MessengerError),
}

/// Errors related to queue subscriptions and rendering.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue event {0} not found")]
    EventNotFound(EventId),

    /// A button press referenced a participant no longer in the list.
    #[error("stale selection: {0}")]
    StaleSelection(String),

    #[error("malformed callback payload: {0}")]
    MalformedCallback(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Messenger(#[from] MessengerError),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// Top-level error for the update routing path. Everything a routed
/// event can fail with funnels into this, so the poller logs one type.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Messenger(#[from] MessengerError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors from the backend API client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,

    #[error("unauthorized (token refresh failed)")]
    Unauthorized,

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Errors from the messaging endpoint.
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("messaging API error: {0}")]
    Api(String),
}

/// Errors from the upstream real-time channel.
///
/// The channel is best-effort: local subscription state stays the source
/// of truth when the channel is down.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("upstream channel disconnected")]
    Disconnected,

    #[error("upstream call failed: {0}")]
    Call(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_error_display() {
        let err = FlowError::Conflict(42);
        assert_eq!(err.to_string(), "user 42 already has an active conversation");
    }

    #[test]
    fn test_queue_error_display() {
        let err = QueueError::EventNotFound(7);
        assert_eq!(err.to_string(), "queue event 7 not found");
    }

    #[test]
    fn test_store_error_wraps_into_flow_error() {
        let err: FlowError = StoreError::Query("syntax error".to_string()).into();
        assert_eq!(err.to_string(), "query error: syntax error");
    }
}
