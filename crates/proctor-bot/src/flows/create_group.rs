//! The create-group wizard: ask for a group string, confirm, create.

use std::sync::Arc;
use std::sync::LazyLock;

use proctor_core::flow::{FlowDefinition, FlowStep, StepContext, StepResult};
use proctor_core::messenger::BoxMessenger;
use proctor_core::provider::AdminApi;
use proctor_types::error::FlowError;
use proctor_types::keyboard::CallbackData;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const FLOW_ID: &str = "create_group";

/// Group strings look like `IS-23-1`: letters, two-digit start year,
/// group number.
static GROUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]+-\d{2}-\d{1,2}$").unwrap()
});

#[derive(Debug, Default, Serialize, Deserialize)]
struct CreateGroupState {
    name: Option<String>,
}

struct AskNameStep {
    messenger: Arc<BoxMessenger>,
}

impl FlowStep for AskNameStep {
    async fn on_enter(&self, ctx: &StepContext<'_>) -> Result<(), FlowError> {
        self.messenger
            .send_message(
                ctx.chat_id(),
                "Send the new group name in the form NAME-YY-Z, e.g. IS-23-1.",
                None,
            )
            .await?;
        Ok(())
    }

    async fn on_text(&self, ctx: &StepContext<'_>, text: &str) -> Result<StepResult, FlowError> {
        let name = text.trim();
        if !GROUP_NAME.is_match(name) {
            self.messenger
                .send_message(ctx.chat_id(), "That does not look like NAME-YY-Z.", None)
                .await?;
            return Ok(StepResult::repeat());
        }
        StepResult::advance().with_state(&CreateGroupState {
            name: Some(name.to_string()),
        })
    }
}

struct ConfirmStep<A> {
    api: Arc<A>,
    messenger: Arc<BoxMessenger>,
}

impl<A: AdminApi> ConfirmStep<A> {
    fn group_name(ctx: &StepContext<'_>) -> Result<String, FlowError> {
        let state: CreateGroupState = ctx.state()?;
        state
            .name
            .ok_or_else(|| FlowError::State("confirm step without a group name".to_string()))
    }
}

impl<A: AdminApi + 'static> FlowStep for ConfirmStep<A> {
    async fn on_enter(&self, ctx: &StepContext<'_>) -> Result<(), FlowError> {
        let name = Self::group_name(ctx)?;
        self.messenger
            .send_confirmation(
                ctx.chat_id(),
                &format!("Create group <b>{name}</b>?"),
                "confirm_create_group:yes",
                "confirm_create_group:no",
            )
            .await?;
        Ok(())
    }

    async fn on_button(
        &self,
        ctx: &StepContext<'_>,
        callback: &CallbackData,
    ) -> Result<StepResult, FlowError> {
        if callback.name != "confirm_create_group" {
            return Ok(StepResult::stay());
        }
        if callback.param != "yes" {
            self.messenger
                .send_message(ctx.chat_id(), "Group creation cancelled.", None)
                .await?;
            return Ok(StepResult::cancel());
        }

        let name = Self::group_name(ctx)?;
        match self.api.create_group(ctx.user_id(), &name).await {
            Ok(()) => {
                info!(user_id = ctx.user_id(), name, "group created");
                self.messenger
                    .send_message(ctx.chat_id(), &format!("Group <b>{name}</b> created."), None)
                    .await?;
            }
            Err(e) => {
                tracing::warn!(user_id = ctx.user_id(), "group creation failed: {e}");
                self.messenger
                    .send_message(
                        ctx.chat_id(),
                        "Could not create the group, please try again later.",
                        None,
                    )
                    .await?;
            }
        }
        Ok(StepResult::finish())
    }
}

pub fn create_group_flow<A: AdminApi + 'static>(
    api: Arc<A>,
    messenger: Arc<BoxMessenger>,
) -> Arc<FlowDefinition> {
    Arc::new(
        FlowDefinition::new(FLOW_ID)
            .step(AskNameStep {
                messenger: Arc::clone(&messenger),
            })
            .step(ConfirmStep { api, messenger }),
    )
}
