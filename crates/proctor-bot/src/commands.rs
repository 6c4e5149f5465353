//! Slash commands registered with the update router.
//!
//! Commands run even while a conversation is active, so /reset can
//! always escape a stuck flow. Flow-starting commands translate
//! [`FlowError::Conflict`] into a notice instead of surfacing an error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use proctor_core::engine::{ConversationManager, SessionStore};
use proctor_core::flow::FlowDefinition;
use proctor_core::messenger::BoxMessenger;
use proctor_core::provider::QueueDataProvider;
use proctor_core::queue::QueueController;
use proctor_core::registry::UpstreamChannel;
use proctor_core::router::BotCommand;
use proctor_types::error::{BotError, FlowError};
use proctor_types::event::InboundEvent;
use serde_json::Value;
use tracing::warn;

use crate::flows::list_queues;

const WELCOME: &str = "Hello! I manage examination queues.\n\n\
    /queues -- list open queues\n\
    /newgroup -- create a study group\n\
    /register -- register as an admin\n\
    /reset -- abandon the current dialog";

const BUSY_NOTICE: &str = "Finish your current dialog first, or send /reset.";

/// Start `flow` for the event's user, translating a conflict into a
/// notice.
async fn start_or_notify<S: SessionStore>(
    manager: &ConversationManager<S>,
    messenger: &BoxMessenger,
    event: &InboundEvent,
    flow: Arc<FlowDefinition>,
    initial_state: Value,
) -> Result<(), BotError> {
    match manager.start(flow, event.chat_id, event.user_id, initial_state).await {
        Ok(()) => Ok(()),
        Err(FlowError::Conflict(_)) => {
            messenger.send_message(event.chat_id, BUSY_NOTICE, None).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub struct StartCommand {
    messenger: Arc<BoxMessenger>,
}

impl StartCommand {
    pub fn new(messenger: Arc<BoxMessenger>) -> Self {
        Self { messenger }
    }
}

impl BotCommand for StartCommand {
    fn name(&self) -> &'static str {
        "/start"
    }

    fn run<'a>(
        &'a self,
        event: &'a InboundEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), BotError>> + Send + 'a>> {
        Box::pin(async move {
            self.messenger.send_message(event.chat_id, WELCOME, None).await?;
            Ok(())
        })
    }
}

pub struct ResetCommand<S: SessionStore + 'static> {
    manager: Arc<ConversationManager<S>>,
    messenger: Arc<BoxMessenger>,
}

impl<S: SessionStore + 'static> ResetCommand<S> {
    pub fn new(manager: Arc<ConversationManager<S>>, messenger: Arc<BoxMessenger>) -> Self {
        Self { manager, messenger }
    }
}

impl<S: SessionStore + 'static> BotCommand for ResetCommand<S> {
    fn name(&self) -> &'static str {
        "/reset"
    }

    fn run<'a>(
        &'a self,
        event: &'a InboundEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), BotError>> + Send + 'a>> {
        Box::pin(async move {
            self.manager.reset(event.user_id).await.map_err(BotError::from)?;
            self.messenger
                .send_message(event.chat_id, "Conversation reset.", None)
                .await?;
            Ok(())
        })
    }
}

/// Fetches the open-queue list and starts the queue-pick flow over it.
pub struct QueuesCommand<P, C, S>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    provider: Arc<P>,
    manager: Arc<ConversationManager<S>>,
    messenger: Arc<BoxMessenger>,
    flow: Arc<FlowDefinition>,
    _channel: std::marker::PhantomData<C>,
}

impl<P, C, S> QueuesCommand<P, C, S>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    pub fn new(
        provider: Arc<P>,
        controller: Arc<QueueController<P, C, S>>,
        manager: Arc<ConversationManager<S>>,
        messenger: Arc<BoxMessenger>,
    ) -> Self {
        let flow = list_queues::list_queues_flow(controller, Arc::clone(&messenger));
        Self {
            provider,
            manager,
            messenger,
            flow,
            _channel: std::marker::PhantomData,
        }
    }
}

impl<P, C, S> BotCommand for QueuesCommand<P, C, S>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    fn name(&self) -> &'static str {
        "/queues"
    }

    fn run<'a>(
        &'a self,
        event: &'a InboundEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), BotError>> + Send + 'a>> {
        Box::pin(async move {
            let queues = match self.provider.list_queues(event.user_id).await {
                Ok(queues) => queues,
                Err(e) => {
                    warn!(user_id = event.user_id, "queue listing failed: {e}");
                    self.messenger
                        .send_message(
                            event.chat_id,
                            "Could not load the queue list, please try again later.",
                            None,
                        )
                        .await?;
                    return Ok(());
                }
            };
            if queues.is_empty() {
                self.messenger
                    .send_message(event.chat_id, "No open queues right now.", None)
                    .await?;
                return Ok(());
            }

            let state = list_queues::initial_state(queues)?;
            start_or_notify(&self.manager, &self.messenger, event, Arc::clone(&self.flow), state)
                .await
        })
    }
}

/// Starts a registry-backed flow under a fixed command word.
pub struct FlowCommand<S: SessionStore + 'static> {
    name: &'static str,
    flow: Arc<FlowDefinition>,
    manager: Arc<ConversationManager<S>>,
    messenger: Arc<BoxMessenger>,
}

impl<S: SessionStore + 'static> FlowCommand<S> {
    pub fn new(
        name: &'static str,
        flow: Arc<FlowDefinition>,
        manager: Arc<ConversationManager<S>>,
        messenger: Arc<BoxMessenger>,
    ) -> Self {
        Self {
            name,
            flow,
            manager,
            messenger,
        }
    }
}

impl<S: SessionStore + 'static> BotCommand for FlowCommand<S> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run<'a>(
        &'a self,
        event: &'a InboundEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), BotError>> + Send + 'a>> {
        Box::pin(async move {
            start_or_notify(
                &self.manager,
                &self.messenger,
                event,
                Arc::clone(&self.flow),
                Value::Null,
            )
            .await
        })
    }
}
