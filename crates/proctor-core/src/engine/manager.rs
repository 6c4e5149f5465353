//! The conversation manager: session lifecycle and step dispatch.
//!
//! Owns starting flows, routing inbound events to the current step's
//! handler, applying the returned transition, and persisting every
//! mutation. The per-user session is the unit of mutual exclusion:
//! concurrent dispatches for one user are serialized through a per-user
//! lock, while different users proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use proctor_types::error::{FlowError, StoreError};
use proctor_types::event::{EventKind, InboundEvent};
use proctor_types::keyboard::CallbackData;
use proctor_types::session::Session;
use proctor_types::{ChatId, UserId};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::store::SessionStore;
use crate::flow::definition::{FlowDefinition, FlowRegistry};
use crate::flow::step::{StepContext, StepResult, Transition};
use crate::messenger::BoxMessenger;

/// Message shown when a handler fails or a persisted session cannot be
/// matched to a flow; the session is deleted alongside it.
const SESSION_RESET_NOTICE: &str = "An internal error occurred. Your session was reset.";

/// Per-user, resumable, multi-step dialogue state machine.
///
/// Generic over `S: SessionStore` for storage flexibility (durable
/// SQLite in production, in-memory for the volatile deployment variant
/// and for tests).
pub struct ConversationManager<S: SessionStore> {
    store: S,
    registry: FlowRegistry,
    messenger: Arc<BoxMessenger>,
    /// Definitions of currently running flows, including ad-hoc ones
    /// that are not in the registry. Lost on restart by design.
    live: DashMap<UserId, Arc<FlowDefinition>>,
    /// Per-user dispatch locks. Entries are created on first use and
    /// kept for the process lifetime.
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl<S: SessionStore> ConversationManager<S> {
    pub fn new(store: S, registry: FlowRegistry, messenger: Arc<BoxMessenger>) -> Self {
        Self {
            store,
            registry,
            messenger,
            live: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn user_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Start `flow` for a user.
    ///
    /// Fails with [`FlowError::Conflict`] if any session already exists
    /// for the user -- nested flows are disallowed, callers must finish
    /// the stale session first. The new session is persisted at step 0
    /// *before* the first `on_enter` runs, so a crash between the two
    /// cannot leave an entered-but-unrecorded step.
    pub async fn start(
        &self,
        flow: Arc<FlowDefinition>,
        chat_id: ChatId,
        user_id: UserId,
        initial_state: Value,
    ) -> Result<(), FlowError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if self.store.load(user_id).await?.is_some() {
            return Err(FlowError::Conflict(user_id));
        }
        if flow.is_empty() {
            return Err(FlowError::State(format!("flow '{}' has no steps", flow.id())));
        }

        let session = Session::new(user_id, chat_id, flow.id(), initial_state);
        self.store.save(&session).await?;
        self.live.insert(user_id, Arc::clone(&flow));

        debug!(user_id, flow = flow.id(), "conversation started");

        let ctx = StepContext::new(&session);
        let first = flow.step_at(0).ok_or_else(|| FlowError::State("empty flow".into()))?;
        if let Err(e) = first.on_enter(&ctx).await {
            self.reset_with_notice(user_id, chat_id, &e).await?;
        }
        Ok(())
    }

    /// Route an inbound event to the current step of the user's flow.
    ///
    /// No active session is a silent no-op: the router only calls this
    /// when membership was already confirmed, but the race is real and
    /// must degrade quietly. Handler failures are absorbed here -- the
    /// session is reset and the user told -- so one user's broken step
    /// never takes down dispatch for anyone else.
    pub async fn dispatch(&self, event: &InboundEvent) -> Result<(), FlowError> {
        let lock = self.user_lock(event.user_id);
        let _guard = lock.lock().await;

        let Some(session) = self.store.load(event.user_id).await? else {
            debug!(user_id = event.user_id, "dispatch without active session, ignoring");
            return Ok(());
        };

        let Some(flow) = self.resolve_flow(&session) else {
            warn!(
                user_id = event.user_id,
                flow = %session.flow_id,
                "persisted session references unknown flow, resetting"
            );
            self.reset_with_notice(
                event.user_id,
                session.chat_id,
                &FlowError::UnknownFlow(session.flow_id.clone()),
            )
            .await?;
            return Ok(());
        };

        let Some(step) = flow.step_at(session.step_index) else {
            // Only reachable through a corrupted record; the engine never
            // persists an out-of-bounds index.
            self.reset_with_notice(
                event.user_id,
                session.chat_id,
                &FlowError::State(format!(
                    "step index {} out of bounds for flow '{}'",
                    session.step_index,
                    flow.id()
                )),
            )
            .await?;
            return Ok(());
        };

        let ctx = StepContext::new(&session);
        let handled = match &event.kind {
            EventKind::Text(text) => step.on_text(&ctx, text).await,
            EventKind::Button(raw) => match CallbackData::parse(raw) {
                Ok(callback) => step.on_button(&ctx, &callback).await,
                Err(e) => {
                    warn!(user_id = event.user_id, %raw, "malformed callback in flow: {e}");
                    Ok(StepResult::stay())
                }
            },
        };

        match handled {
            Ok(result) => self.apply(result, session, &flow).await,
            Err(e) => {
                self.reset_with_notice(event.user_id, session.chat_id, &e).await?;
                Ok(())
            }
        }
    }

    /// Whether the user is currently mid-flow.
    pub async fn is_active(&self, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self.store.load(user_id).await?.is_some())
    }

    /// Forcibly destroy the user's session, if any. External resets
    /// (the `/reset` command) land here; no farewell is sent.
    pub async fn reset(&self, user_id: UserId) -> Result<(), StoreError> {
        self.live.remove(&user_id);
        self.store.delete(user_id).await
    }

    fn resolve_flow(&self, session: &Session) -> Option<Arc<FlowDefinition>> {
        if let Some(live) = self.live.get(&session.user_id) {
            if live.id() == session.flow_id {
                return Some(Arc::clone(&live));
            }
        }
        self.registry.get(&session.flow_id)
    }

    /// Apply a step result: persist any returned payload first, then the
    /// structural effect of the transition.
    async fn apply(
        &self,
        result: StepResult,
        mut session: Session,
        flow: &Arc<FlowDefinition>,
    ) -> Result<(), FlowError> {
        if let Some(state) = result.state {
            session.state = state;
            self.store.save(&session).await?;
        }

        match result.transition {
            Transition::Advance => {
                session.step_index += 1;
                if session.step_index < flow.len() {
                    self.store.save(&session).await?;
                    self.enter_current(&session, flow).await?;
                } else {
                    // Walked past the last step: the flow is exhausted,
                    // treat as Finish.
                    self.destroy(session.user_id).await?;
                }
            }
            Transition::Repeat => {
                self.enter_current(&session, flow).await?;
            }
            Transition::Finish | Transition::Cancel => {
                self.destroy(session.user_id).await?;
            }
            Transition::Stay => {}
        }
        Ok(())
    }

    async fn enter_current(
        &self,
        session: &Session,
        flow: &Arc<FlowDefinition>,
    ) -> Result<(), FlowError> {
        let Some(step) = flow.step_at(session.step_index) else {
            return Ok(());
        };
        let ctx = StepContext::new(session);
        if let Err(e) = step.on_enter(&ctx).await {
            self.reset_with_notice(session.user_id, session.chat_id, &e).await?;
        }
        Ok(())
    }

    async fn destroy(&self, user_id: UserId) -> Result<(), StoreError> {
        self.live.remove(&user_id);
        self.store.delete(user_id).await?;
        debug!(user_id, "conversation finished");
        Ok(())
    }

    /// The dispatch-boundary failure path: log, drop the session, tell
    /// the user. A messenger failure here is only logged -- the session
    /// is already gone and that is the part that matters.
    async fn reset_with_notice(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        cause: &FlowError,
    ) -> Result<(), StoreError> {
        error!(user_id, "flow handler failed, resetting session: {cause}");
        self.destroy(user_id).await?;
        if let Err(e) = self
            .messenger
            .send_message(chat_id, SESSION_RESET_NOTICE, None)
            .await
        {
            warn!(user_id, "failed to deliver reset notice: {e}");
        }
        Ok(())
    }
}
