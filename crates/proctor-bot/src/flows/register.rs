//! The register flow: one step, full name in, backend registration out.

use std::sync::Arc;

use proctor_core::flow::{FlowDefinition, FlowStep, StepContext, StepResult};
use proctor_core::messenger::BoxMessenger;
use proctor_core::provider::AdminApi;
use proctor_types::error::FlowError;
use tracing::info;

pub const FLOW_ID: &str = "register";

struct AskFullNameStep<A> {
    api: Arc<A>,
    messenger: Arc<BoxMessenger>,
}

impl<A: AdminApi + 'static> FlowStep for AskFullNameStep<A> {
    async fn on_enter(&self, ctx: &StepContext<'_>) -> Result<(), FlowError> {
        self.messenger
            .send_message(
                ctx.chat_id(),
                "Send your full name, last name first (e.g. Ivanova Ada).",
                None,
            )
            .await?;
        Ok(())
    }

    async fn on_text(&self, ctx: &StepContext<'_>, text: &str) -> Result<StepResult, FlowError> {
        let full_name = text.trim();
        // At least two words, so the backend can split last/first.
        if full_name.split_whitespace().count() < 2 {
            self.messenger
                .send_message(ctx.chat_id(), "Please send both last and first name.", None)
                .await?;
            return Ok(StepResult::repeat());
        }

        match self.api.register_admin(ctx.user_id(), full_name).await {
            Ok(()) => {
                info!(user_id = ctx.user_id(), "admin registered");
                self.messenger
                    .send_message(ctx.chat_id(), "You are registered.", None)
                    .await?;
                Ok(StepResult::finish())
            }
            Err(e) => {
                tracing::warn!(user_id = ctx.user_id(), "registration failed: {e}");
                self.messenger
                    .send_message(
                        ctx.chat_id(),
                        "Registration failed, please try again later.",
                        None,
                    )
                    .await?;
                Ok(StepResult::cancel())
            }
        }
    }
}

pub fn register_flow<A: AdminApi + 'static>(
    api: Arc<A>,
    messenger: Arc<BoxMessenger>,
) -> Arc<FlowDefinition> {
    Arc::new(FlowDefinition::new(FLOW_ID).step(AskFullNameStep { api, messenger }))
}
