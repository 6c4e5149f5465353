//! Flow steps: handler traits, transitions and step results.

use std::future::Future;
use std::pin::Pin;

use proctor_types::error::FlowError;
use proctor_types::keyboard::CallbackData;
use proctor_types::session::Session;
use proctor_types::{ChatId, UserId};
use serde_json::Value;

/// The outcome a step handler returns, directing the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the next step (or end the flow if this was the last one).
    Advance,
    /// Re-run the current step's `on_enter` (re-prompt).
    Repeat,
    /// Terminate the flow and discard the session.
    Finish,
    /// Terminate like `Finish`; kept distinct so callers can word the
    /// farewell differently.
    Cancel,
    /// No state change, no re-entry.
    Stay,
}

/// Transition plus an optional replacement for the session payload.
///
/// When `state` is set, the engine persists it *before* applying the
/// transition, so a concurrently dispatched duplicate event observes
/// the updated payload even between steps.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub transition: Transition,
    pub state: Option<Value>,
}

impl StepResult {
    pub fn advance() -> Self {
        Self {
            transition: Transition::Advance,
            state: None,
        }
    }

    pub fn repeat() -> Self {
        Self {
            transition: Transition::Repeat,
            state: None,
        }
    }

    pub fn finish() -> Self {
        Self {
            transition: Transition::Finish,
            state: None,
        }
    }

    pub fn cancel() -> Self {
        Self {
            transition: Transition::Cancel,
            state: None,
        }
    }

    pub fn stay() -> Self {
        Self {
            transition: Transition::Stay,
            state: None,
        }
    }

    /// Attach an updated payload to this result.
    pub fn with_state<T: serde::Serialize>(mut self, state: &T) -> Result<Self, FlowError> {
        self.state = Some(
            serde_json::to_value(state)
                .map_err(|e| FlowError::State(format!("failed to encode flow state: {e}")))?,
        );
        Ok(self)
    }
}

/// Read-only view of the session handed to step handlers.
///
/// Handlers never mutate the session directly; updated state travels
/// back inside the [`StepResult`].
pub struct StepContext<'a> {
    pub session: &'a Session,
}

impl<'a> StepContext<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub fn user_id(&self) -> UserId {
        self.session.user_id
    }

    pub fn chat_id(&self) -> ChatId {
        self.session.chat_id
    }

    /// Decode the payload into the flow's own state type.
    pub fn state<T: serde::de::DeserializeOwned>(&self) -> Result<T, FlowError> {
        self.session.decode_state()
    }
}

/// One stage of a flow.
///
/// All three handlers are optional: the defaults do nothing and leave
/// the session where it is, so a step waiting on a button press ignores
/// stray text by design rather than erroring.
///
/// Steps are small structs constructed with their injected collaborators
/// (messenger, API client), not closures over ambient state.
pub trait FlowStep: Send + Sync {
    /// Invoked when the engine transitions into this step. Side effect
    /// only -- typically sends a prompt.
    fn on_enter(&self, _ctx: &StepContext<'_>) -> impl Future<Output = Result<(), FlowError>> + Send {
        async { Ok(()) }
    }

    /// Invoked when this step is current and a free-text reply arrives.
    fn on_text(
        &self,
        _ctx: &StepContext<'_>,
        _text: &str,
    ) -> impl Future<Output = Result<StepResult, FlowError>> + Send {
        async { Ok(StepResult::stay()) }
    }

    /// Invoked when this step is current and a button press arrives.
    fn on_button(
        &self,
        _ctx: &StepContext<'_>,
        _callback: &CallbackData,
    ) -> impl Future<Output = Result<StepResult, FlowError>> + Send {
        async { Ok(StepResult::stay()) }
    }
}

/// Object-safe version of [`FlowStep`] with boxed futures.
///
/// Flow definitions hold heterogeneous step lists, so they store
/// `BoxFlowStep` rather than generics. A blanket implementation covers
/// every `FlowStep`.
pub trait FlowStepDyn: Send + Sync {
    fn on_enter_boxed<'a>(
        &'a self,
        ctx: &'a StepContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<(), FlowError>> + Send + 'a>>;

    fn on_text_boxed<'a>(
        &'a self,
        ctx: &'a StepContext<'a>,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<StepResult, FlowError>> + Send + 'a>>;

    fn on_button_boxed<'a>(
        &'a self,
        ctx: &'a StepContext<'a>,
        callback: &'a CallbackData,
    ) -> Pin<Box<dyn Future<Output = Result<StepResult, FlowError>> + Send + 'a>>;
}

impl<T: FlowStep> FlowStepDyn for T {
    fn on_enter_boxed<'a>(
        &'a self,
        ctx: &'a StepContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<(), FlowError>> + Send + 'a>> {
        Box::pin(self.on_enter(ctx))
    }

    fn on_text_boxed<'a>(
        &'a self,
        ctx: &'a StepContext<'a>,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<StepResult, FlowError>> + Send + 'a>> {
        Box::pin(self.on_text(ctx, text))
    }

    fn on_button_boxed<'a>(
        &'a self,
        ctx: &'a StepContext<'a>,
        callback: &'a CallbackData,
    ) -> Pin<Box<dyn Future<Output = Result<StepResult, FlowError>> + Send + 'a>> {
        Box::pin(self.on_button(ctx, callback))
    }
}

/// Type-erased flow step stored inside a [`super::FlowDefinition`].
pub struct BoxFlowStep {
    inner: Box<dyn FlowStepDyn>,
}

impl BoxFlowStep {
    pub fn new<T: FlowStep + 'static>(step: T) -> Self {
        Self {
            inner: Box::new(step),
        }
    }

    pub async fn on_enter(&self, ctx: &StepContext<'_>) -> Result<(), FlowError> {
        self.inner.on_enter_boxed(ctx).await
    }

    pub async fn on_text(&self, ctx: &StepContext<'_>, text: &str) -> Result<StepResult, FlowError> {
        self.inner.on_text_boxed(ctx, text).await
    }

    pub async fn on_button(
        &self,
        ctx: &StepContext<'_>,
        callback: &CallbackData,
    ) -> Result<StepResult, FlowError> {
        self.inner.on_button_boxed(ctx, callback).await
    }
}
