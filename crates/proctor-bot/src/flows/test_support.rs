//! Shared test doubles for the flow test suites.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use proctor_core::engine::ConversationManager;
use proctor_core::flow::FlowRegistry;
use proctor_core::messenger::{BoxMessenger, Messenger};
use proctor_core::provider::{AdminApi, Grade, QueueDataProvider};
use proctor_core::queue::{ParticipantActionFlows, QueueController, RenderSettings};
use proctor_core::registry::{SubscriptionRegistry, UpstreamChannel};
use proctor_infra::memory::InMemoryStateStore;
use proctor_types::error::{ApiError, ChannelError, MessengerError};
use proctor_types::keyboard::Keyboard;
use proctor_types::queue::{QueueDetail, QueueSummary};
use proctor_types::{ChatId, EventId, MessageId, UserId};
use uuid::Uuid;

/// Swallows every outbound message, assigning incrementing ids.
#[derive(Default)]
pub struct NullMessenger {
    next_id: AtomicI64,
    pub sent: Mutex<Vec<(ChatId, String)>>,
}

impl Messenger for NullMessenger {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, MessengerError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
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
        Ok(())
    }
}

/// Records backend mutations; serves a canned queue detail.
#[derive(Default)]
pub struct FakeApi {
    pub created_groups: Mutex<Vec<String>>,
    pub registered: Mutex<Vec<(UserId, String)>>,
    pub grades: Mutex<Vec<(EventId, Uuid, Grade)>>,
    pub detail: Mutex<Option<QueueDetail>>,
    pub summaries: Mutex<Vec<QueueSummary>>,
}

impl AdminApi for FakeApi {
    async fn register_admin(&self, user_id: UserId, full_name: &str) -> Result<(), ApiError> {
        self.registered.lock().unwrap().push((user_id, full_name.to_string()));
        Ok(())
    }

    async fn create_group(&self, _user_id: UserId, name: &str) -> Result<(), ApiError> {
        self.created_groups.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn grade_participant(
        &self,
        _user_id: UserId,
        event_id: EventId,
        participant_id: Uuid,
        grade: Grade,
    ) -> Result<(), ApiError> {
        self.grades.lock().unwrap().push((event_id, participant_id, grade));
        Ok(())
    }
}

impl QueueDataProvider for FakeApi {
    async fn queue_detail(
        &self,
        _user_id: UserId,
        _event_id: EventId,
    ) -> Result<QueueDetail, ApiError> {
        self.detail.lock().unwrap().clone().ok_or(ApiError::NotFound)
    }

    async fn list_queues(&self, _user_id: UserId) -> Result<Vec<QueueSummary>, ApiError> {
        Ok(self.summaries.lock().unwrap().clone())
    }
}

/// Upstream channel that accepts every call and reports connected.
#[derive(Default)]
pub struct NullChannel;

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

pub type TestController = QueueController<FakeApi, NullChannel, InMemoryStateStore>;

/// A conversation manager over the in-memory store and the given
/// messenger.
pub fn manager_with<M: Messenger + 'static>(
    messenger: M,
) -> (Arc<ConversationManager<InMemoryStateStore>>, Arc<BoxMessenger>) {
    let messenger = Arc::new(BoxMessenger::new(messenger));
    let manager = Arc::new(ConversationManager::new(
        InMemoryStateStore::new(),
        FlowRegistry::new(),
        Arc::clone(&messenger),
    ));
    (manager, messenger)
}

/// A queue controller wired over the fake API and a null channel.
pub fn controller_with(
    api: Arc<FakeApi>,
    manager: Arc<ConversationManager<InMemoryStateStore>>,
    messenger: Arc<BoxMessenger>,
    action_flows: Arc<dyn ParticipantActionFlows>,
) -> Arc<TestController> {
    let registry = Arc::new(SubscriptionRegistry::new(Arc::new(NullChannel)));
    Arc::new(QueueController::new(
        api,
        messenger,
        registry,
        manager,
        action_flows,
        RenderSettings::default(),
    ))
}
