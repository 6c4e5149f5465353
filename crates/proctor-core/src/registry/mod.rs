//! Queue subscription registry: per-user records, per-source reference
//! counts, and push fan-out.
//!
//! The registry deduplicates interest in the shared upstream stream: no
//! matter how many local users watch one queue event, the backend sees
//! exactly one subscription, opened when the local count goes 0 -> 1 and
//! closed when it returns to 0. Pushes fan back out to every interested
//! user individually, because each user's rendering lives in a different
//! message.

pub mod channel;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use proctor_types::error::QueueError;
use proctor_types::queue::{QueuePush, QueueSubscription};
use proctor_types::{EventId, UserId};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use channel::UpstreamChannel;

/// Receives one call per (subscriber, push) pair. Implemented by the
/// queue controller, which edits that subscriber's message in place.
///
/// Registered after construction (the controller needs the registry to
/// exist first), hence the boxed-future object trait rather than RPITIT.
pub trait QueueUpdateSink: Send + Sync {
    fn on_update<'a>(
        &'a self,
        subscription: &'a QueueSubscription,
        push: &'a QueuePush,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>>;
}

/// Concurrent subscription registry with reference-counted upstream
/// subscriptions.
///
/// One active subscription per user: subscribing to a second source
/// replaces the first. All maps are safe for concurrent mutation from
/// the inbound-event path and the upstream-push path; the per-source
/// refcount and its upstream call are atomic as a unit (the slot lock
/// is held across the call).
pub struct SubscriptionRegistry<C: UpstreamChannel> {
    channel: Arc<C>,
    /// The one active subscription per user.
    subscriptions: DashMap<UserId, QueueSubscription>,
    /// Per-source watcher counts. The lock serializes the count change
    /// with the matching upstream call.
    sources: DashMap<EventId, Arc<Mutex<usize>>>,
    sink: OnceLock<Arc<dyn QueueUpdateSink>>,
}

impl<C: UpstreamChannel> SubscriptionRegistry<C> {
    pub fn new(channel: Arc<C>) -> Self {
        Self {
            channel,
            subscriptions: DashMap::new(),
            sources: DashMap::new(),
            sink: OnceLock::new(),
        }
    }

    /// Register the fan-out target. May only be set once; the wiring
    /// code does this right after constructing the queue controller.
    pub fn set_sink(&self, sink: Arc<dyn QueueUpdateSink>) {
        if self.sink.set(sink).is_err() {
            warn!("queue update sink was already set, ignoring");
        }
    }

    /// Subscribe a user, replacing any previous subscription.
    ///
    /// Re-subscribing to the *same* event only refreshes the stored
    /// message id and display fields -- no upstream call. Switching to a
    /// *different* event unsubscribes the old one first.
    pub async fn subscribe(&self, new: QueueSubscription) -> Result<QueueSubscription, QueueError> {
        let previous_event = {
            let existing = self.subscriptions.get_mut(&new.user_id);
            match existing {
                Some(mut entry) if entry.event_id == new.event_id => {
                    entry.message_id = new.message_id;
                    entry.event_name = new.event_name.clone();
                    entry.subject_id = new.subject_id;
                    debug!(
                        user_id = new.user_id,
                        event_id = new.event_id,
                        "refreshed existing subscription in place"
                    );
                    return Ok(entry.clone());
                }
                Some(entry) => Some(entry.event_id),
                None => None,
            }
        };

        if previous_event.is_some() {
            self.unsubscribe(new.user_id).await?;
        }

        self.subscriptions.insert(new.user_id, new.clone());

        let slot = self.source_slot(new.event_id);
        let mut count = slot.lock().await;
        *count += 1;
        if *count == 1 {
            self.upstream_subscribe(new.event_id, new.user_id).await;
        }
        Ok(new)
    }

    /// Remove the user's subscription, if any, closing the upstream
    /// subscription when the last local watcher leaves.
    pub async fn unsubscribe(&self, user_id: UserId) -> Result<(), QueueError> {
        let Some((_, subscription)) = self.subscriptions.remove(&user_id) else {
            return Ok(());
        };

        let slot = self.source_slot(subscription.event_id);
        {
            let mut count = slot.lock().await;
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.upstream_unsubscribe(subscription.event_id).await;
            }
        }
        // Drop the counter entry once nobody watches the source. The
        // try_lock guard keeps a concurrent re-subscribe from losing its
        // freshly incremented slot.
        self.sources.remove_if(&subscription.event_id, |_, slot| {
            slot.try_lock().map(|count| *count == 0).unwrap_or(false)
        });
        Ok(())
    }

    /// Fan one upstream push out to every matching subscriber.
    ///
    /// Delivery is sequential, which keeps each user's stream of
    /// re-renders in push order; cross-user ordering is unspecified.
    /// One subscriber's failure never blocks the rest.
    pub async fn handle_push(&self, push: &QueuePush) {
        let Some(sink) = self.sink.get() else {
            warn!(event_id = push.event_id, "push received before sink was wired, dropping");
            return;
        };

        let interested: Vec<QueueSubscription> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.event_id == push.event_id)
            .map(|entry| entry.clone())
            .collect();

        debug!(
            event_id = push.event_id,
            subscribers = interested.len(),
            "fanning out queue push"
        );

        for subscription in &interested {
            if let Err(e) = sink.on_update(subscription, push).await {
                warn!(
                    user_id = subscription.user_id,
                    event_id = push.event_id,
                    "queue update delivery failed: {e}"
                );
            }
        }
    }

    /// Whether the user currently watches any queue event.
    pub fn is_subscribed(&self, user_id: UserId) -> bool {
        self.subscriptions.contains_key(&user_id)
    }

    /// The user's subscription to a specific event, if it exists.
    pub fn subscription_of(&self, user_id: UserId, event_id: EventId) -> Option<QueueSubscription> {
        self.subscriptions
            .get(&user_id)
            .filter(|entry| entry.event_id == event_id)
            .map(|entry| entry.clone())
    }

    fn source_slot(&self, event_id: EventId) -> Arc<Mutex<usize>> {
        self.sources
            .entry(event_id)
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .clone()
    }

    async fn upstream_subscribe(&self, event_id: EventId, first_user: UserId) {
        if !self.channel.is_connected() {
            warn!(
                event_id,
                "upstream channel disconnected, keeping local subscription only"
            );
            return;
        }
        match self.channel.subscribe(event_id).await {
            Ok(()) => info!(event_id, user_id = first_user, "subscribed upstream for first watcher"),
            Err(e) => warn!(event_id, "upstream subscribe failed, local record kept: {e}"),
        }
    }

    async fn upstream_unsubscribe(&self, event_id: EventId) {
        if !self.channel.is_connected() {
            return;
        }
        match self.channel.unsubscribe(event_id).await {
            Ok(()) => info!(event_id, "unsubscribed upstream, no watchers left"),
            Err(e) => warn!(event_id, "upstream unsubscribe failed: {e}"),
        }
    }
}
