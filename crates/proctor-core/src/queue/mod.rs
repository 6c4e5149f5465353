//! The queue controller: live queue renderings and participant actions.
//!
//! A queue rendering is one message per watching admin, holding a paged
//! keyboard of the event's participants. The controller owns the whole
//! lifecycle: initial send + registry subscription, in-place re-render on
//! every upstream push, page navigation, and turning a participant pick
//! into a conversation flow. When that flow finishes, a completion hook
//! re-sends the rendering so the admin lands back on a fresh queue.

pub mod render;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use proctor_types::error::{ApiError, FlowError, QueueError};
use proctor_types::keyboard::CallbackData;
use proctor_types::queue::{QueuePush, QueueSubscription};
use proctor_types::{ChatId, EventId, UserId};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::{ConversationManager, SessionStore};
use crate::flow::FlowDefinition;
use crate::messenger::BoxMessenger;
use crate::provider::QueueDataProvider;
use crate::registry::{QueueUpdateSink, SubscriptionRegistry, UpstreamChannel};

pub use render::RenderSettings;

/// Shown in place of a rendering whose event disappeared upstream.
const QUEUE_UNAVAILABLE_NOTICE: &str = "This queue is no longer available.";
/// Shown when a pressed button references state that has since changed.
const STALE_SELECTION_NOTICE: &str = "The queue changed, please pick again.";
/// Shown when a pick arrives while the admin is mid-conversation.
const BUSY_NOTICE: &str = "Finish your current dialog before picking a participant.";
/// Replaces a superseded rendering once the queue moved to a new message.
const RESENT_NOTICE: &str = "The queue moved to a new message below.";

/// Everything a participant-action flow needs to know about the pick.
#[derive(Debug, Clone)]
pub struct ParticipantAction {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub event_id: EventId,
    pub subject_id: i64,
    pub participant_id: Uuid,
    pub participant_name: String,
}

/// Runs after a participant-action flow finishes (any outcome). The
/// controller uses it to re-subscribe the admin to the queue they came
/// from.
pub type CompletionHook = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Factory for the conversation started when an admin picks a
/// participant. Implemented in the bot crate, where the concrete flow
/// steps live; the returned flow must invoke `at_end` once it finishes.
pub trait ParticipantActionFlows: Send + Sync {
    fn build(
        &self,
        action: &ParticipantAction,
        at_end: CompletionHook,
    ) -> (Arc<FlowDefinition>, Value);
}

/// Orchestrates queue renderings end to end. Registered as the
/// registry's [`QueueUpdateSink`] so upstream pushes turn into in-place
/// message edits.
pub struct QueueController<P, C, S>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    provider: Arc<P>,
    messenger: Arc<BoxMessenger>,
    registry: Arc<SubscriptionRegistry<C>>,
    manager: Arc<ConversationManager<S>>,
    action_flows: Arc<dyn ParticipantActionFlows>,
    settings: RenderSettings,
}

impl<P, C, S> QueueController<P, C, S>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    pub fn new(
        provider: Arc<P>,
        messenger: Arc<BoxMessenger>,
        registry: Arc<SubscriptionRegistry<C>>,
        manager: Arc<ConversationManager<S>>,
        action_flows: Arc<dyn ParticipantActionFlows>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            provider,
            messenger,
            registry,
            manager,
            action_flows,
            settings,
        }
    }

    /// Send a fresh rendering of the event to the user and register the
    /// subscription. Replaces whatever the user was watching before.
    pub async fn subscribe_to_event(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        event_id: EventId,
    ) -> Result<QueueSubscription, QueueError> {
        open_subscription(
            self.provider.as_ref(),
            self.messenger.as_ref(),
            self.registry.as_ref(),
            self.settings,
            user_id,
            chat_id,
            event_id,
        )
        .await
    }

    /// Drop the user's subscription, if any.
    pub async fn unsubscribe(&self, user_id: UserId) -> Result<(), QueueError> {
        self.registry.unsubscribe(user_id).await
    }

    /// Handle a button press against a queue rendering.
    ///
    /// Returns `Ok(false)` when the callback is not queue-related so the
    /// router can fall through to command handling. Stale presses (old
    /// keyboards, vanished participants) resolve to a user-visible
    /// notice, never an error.
    pub async fn handle_button(
        &self,
        event: &proctor_types::event::InboundEvent,
    ) -> Result<bool, QueueError> {
        let Some(raw) = event.callback_text() else {
            return Ok(false);
        };
        let data = CallbackData::parse(raw)?;

        if data.name == "page" {
            let Some(event_id) = data
                .param
                .strip_prefix("queue_")
                .and_then(|id| id.parse().ok())
            else {
                // Paging for some other list.
                return Ok(false);
            };
            let page = data
                .extra
                .as_deref()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| QueueError::MalformedCallback(raw.to_string()))?;
            self.turn_page(event, event_id, page).await?;
            return Ok(true);
        }

        let Some(event_id) = data.queue_event_id() else {
            return Ok(false);
        };
        self.pick_participant(event, event_id, &data.param).await?;
        Ok(true)
    }

    async fn turn_page(
        &self,
        event: &proctor_types::event::InboundEvent,
        event_id: EventId,
        page: usize,
    ) -> Result<(), QueueError> {
        match self.provider.queue_detail(event.user_id, event_id).await {
            Ok(detail) => {
                let keyboard =
                    render::queue_keyboard(&detail.participants, event_id, page, self.settings);
                self.messenger
                    .edit_message_markup(event.chat_id, event.message_id, Some(&keyboard))
                    .await?;
            }
            Err(ApiError::NotFound) => {
                self.messenger
                    .edit_message_text(event.chat_id, event.message_id, QUEUE_UNAVAILABLE_NOTICE, None)
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn pick_participant(
        &self,
        event: &proctor_types::event::InboundEvent,
        event_id: EventId,
        raw_participant: &str,
    ) -> Result<(), QueueError> {
        let Some(subscription) = self.registry.subscription_of(event.user_id, event_id) else {
            // A press on a rendering the registry no longer backs, for
            // example after switching to another queue.
            self.messenger
                .send_message(event.chat_id, STALE_SELECTION_NOTICE, None)
                .await?;
            return Ok(());
        };

        let participant_id = Uuid::parse_str(raw_participant)
            .map_err(|_| QueueError::MalformedCallback(raw_participant.to_string()))?;

        let detail = match self.provider.queue_detail(event.user_id, event_id).await {
            Ok(detail) => detail,
            Err(ApiError::NotFound) => {
                self.messenger
                    .edit_message_text(event.chat_id, event.message_id, QUEUE_UNAVAILABLE_NOTICE, None)
                    .await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let Some(participant) = detail
            .participants
            .iter()
            .find(|p| p.user_id == participant_id)
        else {
            debug!(
                user_id = event.user_id,
                event_id,
                %participant_id,
                "picked participant no longer in the queue"
            );
            self.messenger
                .send_message(event.chat_id, STALE_SELECTION_NOTICE, None)
                .await?;
            // Refresh the keyboard so the next pick sees current data.
            let keyboard = render::queue_keyboard(&detail.participants, event_id, 0, self.settings);
            self.messenger
                .edit_message_markup(event.chat_id, event.message_id, Some(&keyboard))
                .await?;
            return Ok(());
        };

        let action = ParticipantAction {
            user_id: event.user_id,
            chat_id: event.chat_id,
            event_id,
            subject_id: detail.subject_id,
            participant_id,
            participant_name: format!("{} {}", participant.last_name, participant.first_name),
        };
        let at_end =
            self.resubscribe_hook(event.user_id, event.chat_id, event_id, subscription.message_id);
        let (flow, state) = self.action_flows.build(&action, at_end);

        match self
            .manager
            .start(flow, event.chat_id, event.user_id, state)
            .await
        {
            Ok(()) => Ok(()),
            Err(FlowError::Conflict(_)) => {
                self.messenger
                    .send_message(event.chat_id, BUSY_NOTICE, None)
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-render one subscriber's message after an upstream push.
    async fn rerender(
        &self,
        subscription: &QueueSubscription,
        push: &QueuePush,
    ) -> Result<(), QueueError> {
        debug!(
            user_id = subscription.user_id,
            event_id = push.event_id,
            participant_id = %push.participant_id,
            "re-rendering queue after push"
        );
        // Admin chats are DMs: the chat id equals the user id.
        let chat_id: ChatId = subscription.user_id;
        match self
            .provider
            .queue_detail(subscription.user_id, subscription.event_id)
            .await
        {
            Ok(detail) => {
                let keyboard = render::queue_keyboard(
                    &detail.participants,
                    subscription.event_id,
                    0,
                    self.settings,
                );
                let text = format!("Queue: {}", detail.display_name());
                self.messenger
                    .edit_message_text(chat_id, subscription.message_id, &text, Some(&keyboard))
                    .await?;
            }
            Err(ApiError::NotFound) => {
                self.messenger
                    .edit_message_text(
                        chat_id,
                        subscription.message_id,
                        QUEUE_UNAVAILABLE_NOTICE,
                        None,
                    )
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn resubscribe_hook(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        event_id: EventId,
        old_message_id: proctor_types::MessageId,
    ) -> CompletionHook {
        let provider = Arc::clone(&self.provider);
        let messenger = Arc::clone(&self.messenger);
        let registry = Arc::clone(&self.registry);
        let settings = self.settings;
        Arc::new(move || {
            let provider = Arc::clone(&provider);
            let messenger = Arc::clone(&messenger);
            let registry = Arc::clone(&registry);
            Box::pin(async move {
                match open_subscription(
                    provider.as_ref(),
                    messenger.as_ref(),
                    registry.as_ref(),
                    settings,
                    user_id,
                    chat_id,
                    event_id,
                )
                .await
                {
                    Ok(renewed) if renewed.message_id != old_message_id => {
                        // Retire the superseded rendering so the admin
                        // does not press buttons on a stale keyboard.
                        if let Err(e) = messenger
                            .edit_message_text(chat_id, old_message_id, RESENT_NOTICE, None)
                            .await
                        {
                            warn!(user_id, old_message_id, "failed to retire old rendering: {e}");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(user_id, event_id, "re-subscribe after action flow failed: {e}");
                    }
                }
            })
        })
    }
}

impl<P, C, S> QueueUpdateSink for QueueController<P, C, S>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    fn on_update<'a>(
        &'a self,
        subscription: &'a QueueSubscription,
        push: &'a QueuePush,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>> {
        Box::pin(self.rerender(subscription, push))
    }
}

/// Fetch, render, send, register. Shared by the public subscribe path
/// and the post-flow completion hook.
async fn open_subscription<P: QueueDataProvider, C: UpstreamChannel>(
    provider: &P,
    messenger: &BoxMessenger,
    registry: &SubscriptionRegistry<C>,
    settings: RenderSettings,
    user_id: UserId,
    chat_id: ChatId,
    event_id: EventId,
) -> Result<QueueSubscription, QueueError> {
    let detail = match provider.queue_detail(user_id, event_id).await {
        Ok(detail) => detail,
        Err(ApiError::NotFound) => return Err(QueueError::EventNotFound(event_id)),
        Err(e) => return Err(e.into()),
    };

    let keyboard = render::queue_keyboard(&detail.participants, event_id, 0, settings);
    let text = format!("Queue: {}", detail.display_name());
    let message_id = messenger.send_message(chat_id, &text, Some(&keyboard)).await?;

    registry
        .subscribe(QueueSubscription {
            user_id,
            event_id,
            message_id,
            subject_id: detail.subject_id,
            event_name: detail.display_name(),
        })
        .await
}
