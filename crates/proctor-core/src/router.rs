//! Routing of normalized inbound events.
//!
//! One routing rule set for the whole bot:
//! - text starting with `/` is a command, looked up by its first word;
//!   commands run even while a conversation is active (that is how
//!   `/reset` escapes a stuck flow)
//! - other text goes to the conversation engine, which ignores it
//!   silently when the user has no active session
//! - button presses go to the active conversation if there is one,
//!   otherwise to the queue controller; whatever neither claims is
//!   logged and dropped

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use proctor_types::error::{BotError, QueueError};
use proctor_types::event::{EventKind, InboundEvent};
use tracing::{debug, warn};

use crate::engine::{ConversationManager, SessionStore};
use crate::provider::QueueDataProvider;
use crate::queue::QueueController;
use crate::registry::UpstreamChannel;

/// A slash command. Implementations live in the bot crate and are
/// stored as trait objects in the router's command table, hence the
/// boxed-future method.
pub trait BotCommand: Send + Sync {
    /// The command word including the slash, e.g. `/queues`.
    fn name(&self) -> &'static str;

    fn run<'a>(
        &'a self,
        event: &'a InboundEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), BotError>> + Send + 'a>>;
}

/// Dispatches every normalized event to exactly one handler.
pub struct UpdateRouter<P, C, S>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    manager: Arc<ConversationManager<S>>,
    controller: Arc<QueueController<P, C, S>>,
    commands: HashMap<&'static str, Arc<dyn BotCommand>>,
}

impl<P, C, S> UpdateRouter<P, C, S>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    pub fn new(
        manager: Arc<ConversationManager<S>>,
        controller: Arc<QueueController<P, C, S>>,
    ) -> Self {
        Self {
            manager,
            controller,
            commands: HashMap::new(),
        }
    }

    pub fn register_command(&mut self, command: Arc<dyn BotCommand>) {
        self.commands.insert(command.name(), command);
    }

    /// Route one event. Malformed button payloads are logged and
    /// swallowed here so a single bad press never surfaces as a poller
    /// error.
    pub async fn route(&self, event: &InboundEvent) -> Result<(), BotError> {
        match &event.kind {
            EventKind::Text(text) => {
                if let Some(name) = command_word(text) {
                    let name = name.to_ascii_lowercase();
                    let Some(command) = self.commands.get(name.as_str()) else {
                        debug!(user_id = event.user_id, command = %name, "unknown command, ignoring");
                        return Ok(());
                    };
                    return command.run(event).await;
                }
                self.manager.dispatch(event).await?;
                Ok(())
            }
            EventKind::Button(_) => {
                if self.manager.is_active(event.user_id).await? {
                    self.manager.dispatch(event).await?;
                    return Ok(());
                }
                match self.controller.handle_button(event).await {
                    Ok(true) => Ok(()),
                    Ok(false) => {
                        debug!(user_id = event.user_id, "callback matched no handler, dropping");
                        Ok(())
                    }
                    Err(QueueError::MalformedCallback(raw)) => {
                        warn!(user_id = event.user_id, raw, "malformed callback payload dropped");
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

/// The command word of a slash command, or `None` for plain text.
fn command_word(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    Some(trimmed.split_whitespace().next().unwrap_or(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{FlowDefinition, FlowRegistry, FlowStep, StepContext, StepResult};
    use crate::messenger::{BoxMessenger, Messenger};
    use crate::queue::{
        CompletionHook, ParticipantAction, ParticipantActionFlows, RenderSettings,
    };
    use crate::registry::SubscriptionRegistry;
    use chrono::Utc;
    use dashmap::DashMap;
    use proctor_types::error::{ApiError, ChannelError, FlowError, MessengerError, StoreError};
    use proctor_types::keyboard::{CallbackData, Keyboard};
    use proctor_types::queue::{
        ParticipantStatus, QueueDetail, QueueParticipant, QueueSummary,
    };
    use proctor_types::session::Session;
    use proctor_types::{ChatId, EventId, MessageId, UserId};
    use serde_json::Value;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticProvider(QueueDetail);

    impl QueueDataProvider for StaticProvider {
        async fn queue_detail(
            &self,
            _user_id: UserId,
            _event_id: EventId,
        ) -> Result<QueueDetail, ApiError> {
            Ok(self.0.clone())
        }

        async fn list_queues(&self, _user_id: UserId) -> Result<Vec<QueueSummary>, ApiError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingMessenger {
        sends: AtomicUsize,
        markup_edits: AtomicUsize,
    }

    struct SharedMessenger(Arc<CountingMessenger>);

    impl Messenger for SharedMessenger {
        async fn send_message(
            &self,
            _chat_id: ChatId,
            _text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<MessageId, MessengerError> {
            Ok(self.0.sends.fetch_add(1, Ordering::SeqCst) as MessageId + 1)
        }

        async fn edit_message_text(
            &self,
            _chat_id: ChatId,
            _message_id: MessageId,
            _text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), MessengerError> {
            Ok(())
        }

        async fn edit_message_markup(
            &self,
            _chat_id: ChatId,
            _message_id: MessageId,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), MessengerError> {
            self.0.markup_edits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NullChannel;

    impl UpstreamChannel for NullChannel {
        async fn subscribe(&self, _event_id: EventId) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn unsubscribe(&self, _event_id: EventId) -> Result<(), ChannelError> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct MapStore {
        sessions: DashMap<UserId, Session>,
    }

    impl SessionStore for MapStore {
        async fn save(&self, session: &Session) -> Result<(), StoreError> {
            self.sessions.insert(session.user_id, session.clone());
            Ok(())
        }

        async fn load(&self, user_id: UserId) -> Result<Option<Session>, StoreError> {
            Ok(self.sessions.get(&user_id).map(|s| s.clone()))
        }

        async fn delete(&self, user_id: UserId) -> Result<(), StoreError> {
            self.sessions.remove(&user_id);
            Ok(())
        }
    }

    /// Records everything its handlers see, never moves.
    #[derive(Clone, Default)]
    struct RecordStep {
        texts: Arc<StdMutex<Vec<String>>>,
        callbacks: Arc<StdMutex<Vec<String>>>,
    }

    impl FlowStep for RecordStep {
        async fn on_text(
            &self,
            _ctx: &StepContext<'_>,
            text: &str,
        ) -> Result<StepResult, FlowError> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(StepResult::stay())
        }

        async fn on_button(
            &self,
            _ctx: &StepContext<'_>,
            callback: &CallbackData,
        ) -> Result<StepResult, FlowError> {
            self.callbacks.lock().unwrap().push(callback.to_string());
            Ok(StepResult::stay())
        }
    }

    struct NoFlows;

    impl ParticipantActionFlows for NoFlows {
        fn build(
            &self,
            _action: &ParticipantAction,
            _at_end: CompletionHook,
        ) -> (Arc<FlowDefinition>, Value) {
            (
                Arc::new(FlowDefinition::new("unused").step(RecordStep::default())),
                Value::Null,
            )
        }
    }

    #[derive(Default)]
    struct CountingCommand {
        runs: AtomicUsize,
    }

    impl BotCommand for CountingCommand {
        fn name(&self) -> &'static str {
            "/reset"
        }

        fn run<'a>(
            &'a self,
            _event: &'a InboundEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(), BotError>> + Send + 'a>> {
            Box::pin(async move {
                self.runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    fn detail() -> QueueDetail {
        QueueDetail {
            event_id: 5,
            event_name: "Lab defence".to_string(),
            event_date_time: Utc::now(),
            subject_id: 3,
            participants: vec![QueueParticipant {
                user_id: uuid::Uuid::now_v7(),
                first_name: "Ada".to_string(),
                last_name: "Ivanova".to_string(),
                group_name: "IS-23-1".to_string(),
                total_points: 4,
                status: ParticipantStatus::Waiting,
                color: "#07FF00".to_string(),
                checking_by_admin_name: None,
            }],
        }
    }

    struct Fixture {
        router: UpdateRouter<StaticProvider, NullChannel, MapStore>,
        manager: Arc<ConversationManager<MapStore>>,
        controller: Arc<QueueController<StaticProvider, NullChannel, MapStore>>,
        messenger_log: Arc<CountingMessenger>,
    }

    fn fixture() -> Fixture {
        let log = Arc::new(CountingMessenger::default());
        let messenger = Arc::new(BoxMessenger::new(SharedMessenger(Arc::clone(&log))));
        let registry = Arc::new(SubscriptionRegistry::new(Arc::new(NullChannel)));
        let manager = Arc::new(ConversationManager::new(
            MapStore::default(),
            FlowRegistry::new(),
            Arc::clone(&messenger),
        ));
        let controller = Arc::new(QueueController::new(
            Arc::new(StaticProvider(detail())),
            messenger,
            registry,
            Arc::clone(&manager),
            Arc::new(NoFlows),
            RenderSettings::default(),
        ));
        let router = UpdateRouter::new(Arc::clone(&manager), Arc::clone(&controller));
        Fixture {
            router,
            manager,
            controller,
            messenger_log: log,
        }
    }

    async fn start_recording_flow(manager: &ConversationManager<MapStore>) -> RecordStep {
        let step = RecordStep::default();
        let flow = Arc::new(FlowDefinition::new("recording").step(step.clone()));
        manager.start(flow, 1, 1, Value::Null).await.unwrap();
        step
    }

    #[tokio::test]
    async fn test_plain_text_reaches_the_active_flow() {
        let f = fixture();
        let step = start_recording_flow(&f.manager).await;

        f.router
            .route(&InboundEvent::text(1, 1, 10, "Ivanov Ivan"))
            .await
            .unwrap();

        assert_eq!(*step.texts.lock().unwrap(), vec!["Ivanov Ivan".to_string()]);
    }

    #[tokio::test]
    async fn test_command_runs_even_during_a_flow() {
        let mut f = fixture();
        let command = Arc::new(CountingCommand::default());
        f.router.register_command(command.clone());
        let step = start_recording_flow(&f.manager).await;

        f.router
            .route(&InboundEvent::text(1, 1, 10, "/reset now"))
            .await
            .unwrap();

        assert_eq!(command.runs.load(Ordering::SeqCst), 1);
        assert!(step.texts.lock().unwrap().is_empty(), "commands bypass the flow");
    }

    #[tokio::test]
    async fn test_command_lookup_is_case_insensitive() {
        let mut f = fixture();
        let command = Arc::new(CountingCommand::default());
        f.router.register_command(command.clone());

        f.router
            .route(&InboundEvent::text(1, 1, 10, "/Reset"))
            .await
            .unwrap();

        assert_eq!(command.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_command_is_ignored() {
        let f = fixture();
        f.router
            .route(&InboundEvent::text(1, 1, 10, "/bogus"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_plain_text_without_session_is_a_noop() {
        let f = fixture();
        f.router
            .route(&InboundEvent::text(1, 1, 10, "hello?"))
            .await
            .unwrap();
        assert_eq!(f.messenger_log.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_button_prefers_the_active_flow() {
        let f = fixture();
        let step = start_recording_flow(&f.manager).await;

        f.router
            .route(&InboundEvent::button(1, 1, 10, "page:queue_5:1"))
            .await
            .unwrap();

        assert_eq!(*step.callbacks.lock().unwrap(), vec!["page:queue_5:1".to_string()]);
        assert_eq!(
            f.messenger_log.markup_edits.load(Ordering::SeqCst),
            0,
            "queue controller must not see flow-claimed callbacks"
        );
    }

    #[tokio::test]
    async fn test_button_falls_through_to_queue_controller() {
        let f = fixture();
        f.controller.subscribe_to_event(1, 1, 5).await.unwrap();

        f.router
            .route(&InboundEvent::button(1, 1, 1, "page:queue_5:0"))
            .await
            .unwrap();

        assert_eq!(f.messenger_log.markup_edits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_callback_is_swallowed() {
        let f = fixture();
        f.router
            .route(&InboundEvent::button(1, 1, 1, "garbage"))
            .await
            .unwrap();
    }
}
