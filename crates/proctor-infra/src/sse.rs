//! Server-sent-events upstream channel.
//!
//! One long-lived SSE connection per process carries queue pushes for
//! every source the bot registered interest in; `subscribe`/`unsubscribe`
//! are plain HTTP calls keyed by a per-process client id. The stream is
//! best-effort: on disconnect the worker backs off and reconnects, and
//! the registry keeps treating its local records as the source of truth
//! while `is_connected` reports false.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use proctor_core::registry::UpstreamChannel;
use proctor_types::EventId;
use proctor_types::error::ChannelError;
use proctor_types::queue::QueuePush;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// SSE event name carrying a [`QueuePush`] payload.
const PUSH_EVENT: &str = "queue-update";

pub struct SseChannel {
    client: reqwest::Client,
    base_url: String,
    /// Identifies this process to the backend so subscribe calls attach
    /// to the right stream.
    client_id: Uuid,
    connected: AtomicBool,
}

impl SseChannel {
    pub fn new(base_url: &str) -> Self {
        Self {
            // No overall timeout: the stream is expected to stay open.
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: Uuid::now_v7(),
            connected: AtomicBool::new(false),
        }
    }

    /// Run the read side until cancelled: connect, forward pushes to
    /// `handle`, reconnect with a delay on any stream failure.
    pub async fn run<H, Fut>(&self, handle: H, cancel: CancellationToken)
    where
        H: Fn(QueuePush) -> Fut + Send + Sync,
        Fut: Future<Output = ()> + Send,
    {
        while !cancel.is_cancelled() {
            match self.connect().await {
                Ok(response) => {
                    self.connected.store(true, Ordering::SeqCst);
                    info!(client_id = %self.client_id, "upstream stream connected");
                    self.read_stream(response, &handle, &cancel).await;
                    self.connected.store(false, Ordering::SeqCst);
                }
                Err(e) => {
                    warn!("upstream stream connect failed: {e}");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn connect(&self) -> Result<reqwest::Response, ChannelError> {
        let response = self
            .client
            .get(format!(
                "{}/api/queues/stream?client={}",
                self.base_url, self.client_id
            ))
            .send()
            .await
            .map_err(|e| ChannelError::Call(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChannelError::Call(format!(
                "stream rejected with status {}",
                response.status()
            )));
        }
        Ok(response)
    }

    async fn read_stream<H, Fut>(
        &self,
        response: reqwest::Response,
        handle: &H,
        cancel: &CancellationToken,
    ) where
        H: Fn(QueuePush) -> Fut + Send + Sync,
        Fut: Future<Output = ()> + Send,
    {
        let mut stream = response.bytes_stream().eventsource();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        if event.event != PUSH_EVENT {
                            continue;
                        }
                        let Some(push) = decode_push(&event.data) else {
                            warn!(data = %event.data, "undecodable queue push, skipping");
                            continue;
                        };
                        handle(push).await;
                    }
                    Some(Err(e)) => {
                        warn!("upstream stream error: {e}");
                        return;
                    }
                    None => {
                        info!("upstream stream closed by server");
                        return;
                    }
                }
            }
        }
    }

    async fn call(&self, event_id: EventId, action: &str) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(format!(
                "{}/api/queues/{event_id}/{action}?client={}",
                self.base_url, self.client_id
            ))
            .send()
            .await
            .map_err(|e| ChannelError::Call(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                // The source vanished server-side; nothing to hold open.
                Ok(())
            }
            status => Err(ChannelError::Call(format!("{action} failed with status {status}"))),
        }
    }
}

impl UpstreamChannel for SseChannel {
    async fn subscribe(&self, event_id: EventId) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }
        self.call(event_id, "subscribe").await
    }

    async fn unsubscribe(&self, event_id: EventId) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }
        self.call(event_id, "unsubscribe").await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

fn decode_push(data: &str) -> Option<QueuePush> {
    serde_json::from_str(data).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_types::queue::ParticipantStatus;

    #[test]
    fn test_starts_disconnected() {
        let channel = SseChannel::new("http://localhost:5000");
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_decode_push_payload() {
        let push = decode_push(
            r#"{"eventId":3,"participantId":"01990041-ad21-792d-a63d-1d6c86063b19","newStatus":"finished"}"#,
        )
        .unwrap();
        assert_eq!(push.event_id, 3);
        assert_eq!(push.new_status, ParticipantStatus::Finished);
    }

    #[test]
    fn test_decode_push_rejects_garbage() {
        assert!(decode_push("not json").is_none());
    }

    #[tokio::test]
    async fn test_calls_while_disconnected_fail_fast() {
        let channel = SseChannel::new("http://localhost:5000");
        let err = channel.subscribe(1).await.unwrap_err();
        assert!(matches!(err, ChannelError::Disconnected));
    }
}
