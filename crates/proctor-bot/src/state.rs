//! Construction of the application object graph.
//!
//! Concrete types are pinned here once; everything below this layer is
//! generic over its ports. The conversation manager and the API client
//! each get their own store handle: in SQLite mode both wrap the same
//! pool, in memory mode they are independent maps (sessions and tokens
//! never share keyspace).

use std::sync::Arc;

use proctor_core::engine::ConversationManager;
use proctor_core::flow::FlowRegistry;
use proctor_core::messenger::BoxMessenger;
use proctor_core::queue::{QueueController, RenderSettings};
use proctor_core::registry::{QueueUpdateSink, SubscriptionRegistry};
use proctor_core::router::UpdateRouter;
use proctor_infra::api::ApiClient;
use proctor_infra::memory::InMemoryStateStore;
use proctor_infra::sqlite::{DatabasePool, SqliteStateStore, database_url};
use proctor_infra::sse::SseChannel;
use proctor_infra::state::StateStore;
use proctor_infra::telegram::TelegramClient;
use proctor_types::config::{BotConfig, BotSecrets};
use tracing::info;

use crate::commands::{FlowCommand, QueuesCommand, ResetCommand, StartCommand};
use crate::flows::{SubmissionFlows, create_group_flow, register_flow};

pub type Provider = ApiClient<StateStore>;
pub type Manager = ConversationManager<StateStore>;
pub type Registry = SubscriptionRegistry<SseChannel>;
pub type Controller = QueueController<Provider, SseChannel, StateStore>;
pub type Router = UpdateRouter<Provider, SseChannel, StateStore>;

/// Everything the runtime tasks need, fully wired.
pub struct AppState {
    pub telegram: Arc<TelegramClient>,
    pub router: Arc<Router>,
    pub channel: Arc<SseChannel>,
    pub registry: Arc<Registry>,
    pub poll_timeout_secs: u64,
}

impl AppState {
    pub async fn init(
        config: &BotConfig,
        secrets: &BotSecrets,
        in_memory: bool,
    ) -> anyhow::Result<Self> {
        let telegram = Arc::new(TelegramClient::new(&secrets.bot_token, config.poll_timeout_secs));
        let messenger = Arc::new(BoxMessenger::new(Arc::clone(&telegram)));

        let (session_store, token_store) = if in_memory {
            info!("using in-memory state, sessions will not survive a restart");
            (
                StateStore::Memory(InMemoryStateStore::new()),
                StateStore::Memory(InMemoryStateStore::new()),
            )
        } else {
            let pool = DatabasePool::new(&database_url(&config.database_path)).await?;
            info!(path = %config.database_path, "sqlite state store ready");
            (
                StateStore::Sqlite(SqliteStateStore::new(pool.clone())),
                StateStore::Sqlite(SqliteStateStore::new(pool)),
            )
        };

        let api = Arc::new(ApiClient::new(
            &config.api_base_url,
            secrets.login_secret.clone(),
            Arc::new(token_store),
        ));
        let channel = Arc::new(SseChannel::new(&config.api_base_url));
        let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&channel)));

        let mut flows = FlowRegistry::new();
        flows.register(create_group_flow(Arc::clone(&api), Arc::clone(&messenger)));
        flows.register(register_flow(Arc::clone(&api), Arc::clone(&messenger)));

        let manager = Arc::new(ConversationManager::new(
            session_store,
            flows,
            Arc::clone(&messenger),
        ));

        let settings = RenderSettings {
            page_size: config.page_size,
            line_size: config.line_size,
        };
        let action_flows = Arc::new(SubmissionFlows::new(Arc::clone(&api), Arc::clone(&messenger)));
        let controller = Arc::new(QueueController::new(
            Arc::clone(&api),
            Arc::clone(&messenger),
            Arc::clone(&registry),
            Arc::clone(&manager),
            action_flows,
            settings,
        ));
        registry.set_sink(Arc::clone(&controller) as Arc<dyn QueueUpdateSink>);

        let mut router = UpdateRouter::new(Arc::clone(&manager), Arc::clone(&controller));
        router.register_command(Arc::new(StartCommand::new(Arc::clone(&messenger))));
        router.register_command(Arc::new(ResetCommand::new(
            Arc::clone(&manager),
            Arc::clone(&messenger),
        )));
        router.register_command(Arc::new(QueuesCommand::new(
            Arc::clone(&api),
            Arc::clone(&controller),
            Arc::clone(&manager),
            Arc::clone(&messenger),
        )));
        router.register_command(Arc::new(FlowCommand::new(
            "/newgroup",
            create_group_flow(Arc::clone(&api), Arc::clone(&messenger)),
            Arc::clone(&manager),
            Arc::clone(&messenger),
        )));
        router.register_command(Arc::new(FlowCommand::new(
            "/register",
            register_flow(Arc::clone(&api), Arc::clone(&messenger)),
            Arc::clone(&manager),
            Arc::clone(&messenger),
        )));

        Ok(Self {
            telegram,
            router: Arc::new(router),
            channel,
            registry,
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }
}
