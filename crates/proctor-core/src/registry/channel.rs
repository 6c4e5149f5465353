//! The upstream real-time channel port.
//!
//! The transport (connection management, reconnect/backoff, push
//! delivery) lives in proctor-infra; the registry only needs the two
//! subscription calls and a connectivity probe. Upstream state is
//! best-effort: when the channel is down the registry skips the call
//! and keeps its local records as the source of truth.

use std::future::Future;

use proctor_types::EventId;
use proctor_types::error::ChannelError;

/// Server-side subscription management for queue event streams.
pub trait UpstreamChannel: Send + Sync {
    /// Ask the backend to start pushing updates for `event_id`.
    fn subscribe(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Ask the backend to stop pushing updates for `event_id`.
    fn unsubscribe(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Whether the channel currently holds a live connection.
    fn is_connected(&self) -> bool;
}
