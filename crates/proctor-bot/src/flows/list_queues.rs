//! The queue-listing flow: pick one open queue and start watching it.
//!
//! The /queues command fetches the open-queue list before starting the
//! flow and passes it in as the initial state, so an empty list never
//! opens a dialog and the keyboard renders without a second fetch.

use std::sync::Arc;

use proctor_core::engine::SessionStore;
use proctor_core::flow::{FlowDefinition, FlowStep, StepContext, StepResult};
use proctor_core::messenger::BoxMessenger;
use proctor_core::provider::QueueDataProvider;
use proctor_core::queue::QueueController;
use proctor_core::registry::UpstreamChannel;
use proctor_types::EventId;
use proctor_types::error::{FlowError, QueueError};
use proctor_types::keyboard::{CallbackData, Keyboard, KeyboardButton};
use proctor_types::queue::QueueSummary;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const FLOW_ID: &str = "list_queues";

#[derive(Debug, Serialize, Deserialize)]
struct ListQueuesState {
    queues: Vec<QueueSummary>,
}

/// Encode the already-fetched queue list as the initial flow state.
pub fn initial_state(queues: Vec<QueueSummary>) -> Result<Value, FlowError> {
    serde_json::to_value(ListQueuesState { queues })
        .map_err(|e| FlowError::State(format!("failed to encode queue list: {e}")))
}

fn queue_label(summary: &QueueSummary) -> String {
    format!(
        "{} -- {}",
        summary.event_date_time.format("%Y-%m-%d"),
        summary.event_name
    )
}

struct PickQueueStep<P, C, S>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    controller: Arc<QueueController<P, C, S>>,
    messenger: Arc<BoxMessenger>,
}

impl<P, C, S> FlowStep for PickQueueStep<P, C, S>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    async fn on_enter(&self, ctx: &StepContext<'_>) -> Result<(), FlowError> {
        let state: ListQueuesState = ctx.state()?;
        let mut keyboard = Keyboard::new();
        for summary in &state.queues {
            keyboard.push_row(vec![KeyboardButton::new(
                queue_label(summary),
                format!("open_queue:{}", summary.event_id),
            )]);
        }
        self.messenger
            .send_message(ctx.chat_id(), "Open queues:", Some(&keyboard))
            .await?;
        Ok(())
    }

    async fn on_button(
        &self,
        ctx: &StepContext<'_>,
        callback: &CallbackData,
    ) -> Result<StepResult, FlowError> {
        if callback.name != "open_queue" {
            return Ok(StepResult::stay());
        }
        let Ok(event_id) = callback.param.parse::<EventId>() else {
            return Ok(StepResult::stay());
        };

        match self
            .controller
            .subscribe_to_event(ctx.user_id(), ctx.chat_id(), event_id)
            .await
        {
            Ok(_) => Ok(StepResult::finish()),
            Err(QueueError::EventNotFound(_)) => {
                self.messenger
                    .send_message(
                        ctx.chat_id(),
                        "That queue is no longer open, run /queues again.",
                        None,
                    )
                    .await?;
                Ok(StepResult::finish())
            }
            Err(e) => {
                warn!(user_id = ctx.user_id(), event_id, "failed to open queue: {e}");
                self.messenger
                    .send_message(
                        ctx.chat_id(),
                        "Could not open the queue, please try again later.",
                        None,
                    )
                    .await?;
                Ok(StepResult::finish())
            }
        }
    }
}

pub fn list_queues_flow<P, C, S>(
    controller: Arc<QueueController<P, C, S>>,
    messenger: Arc<BoxMessenger>,
) -> Arc<FlowDefinition>
where
    P: QueueDataProvider + 'static,
    C: UpstreamChannel + 'static,
    S: SessionStore + 'static,
{
    Arc::new(FlowDefinition::new(FLOW_ID).step(PickQueueStep {
        controller,
        messenger,
    }))
}
