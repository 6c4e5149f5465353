//! The submission flow: grade the participant an admin picked from a
//! queue rendering.
//!
//! Built per pick, because each run captures the picked participant and
//! the controller's completion hook. The hook runs after the final step
//! regardless of outcome, putting the admin back on a fresh queue
//! rendering.

use std::sync::Arc;

use proctor_core::flow::{FlowDefinition, FlowStep, StepContext, StepResult};
use proctor_core::messenger::BoxMessenger;
use proctor_core::provider::{AdminApi, Grade};
use proctor_core::queue::{CompletionHook, ParticipantAction, ParticipantActionFlows};
use proctor_types::error::FlowError;
use proctor_types::keyboard::{CallbackData, Keyboard, KeyboardButton};
use proctor_types::queue::ParticipantStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

pub const FLOW_ID: &str = "submission";

const MAX_POINTS: i32 = 100;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SubmissionState {
    points: Option<i32>,
    skipped: bool,
}

struct AskPointsStep {
    messenger: Arc<BoxMessenger>,
    participant_name: String,
}

impl FlowStep for AskPointsStep {
    async fn on_enter(&self, ctx: &StepContext<'_>) -> Result<(), FlowError> {
        let mut keyboard = Keyboard::new();
        keyboard.push_row(vec![KeyboardButton::new("Skip participant", "grade:skip")]);
        self.messenger
            .send_message(
                ctx.chat_id(),
                &format!(
                    "Grading <b>{}</b>. Send the points (0-{MAX_POINTS}), or skip.",
                    self.participant_name
                ),
                Some(&keyboard),
            )
            .await?;
        Ok(())
    }

    async fn on_text(&self, ctx: &StepContext<'_>, text: &str) -> Result<StepResult, FlowError> {
        let points = text.trim().parse::<i32>().ok().filter(|p| (0..=MAX_POINTS).contains(p));
        let Some(points) = points else {
            self.messenger
                .send_message(
                    ctx.chat_id(),
                    &format!("Points must be a number between 0 and {MAX_POINTS}."),
                    None,
                )
                .await?;
            return Ok(StepResult::repeat());
        };
        StepResult::advance().with_state(&SubmissionState {
            points: Some(points),
            skipped: false,
        })
    }

    async fn on_button(
        &self,
        _ctx: &StepContext<'_>,
        callback: &CallbackData,
    ) -> Result<StepResult, FlowError> {
        if callback.name != "grade" || callback.param != "skip" {
            return Ok(StepResult::stay());
        }
        StepResult::advance().with_state(&SubmissionState {
            points: None,
            skipped: true,
        })
    }
}

struct ConfirmGradeStep<A> {
    api: Arc<A>,
    messenger: Arc<BoxMessenger>,
    action: ParticipantAction,
    at_end: CompletionHook,
}

impl<A: AdminApi> ConfirmGradeStep<A> {
    fn grade(state: &SubmissionState) -> Result<Grade, FlowError> {
        if state.skipped {
            return Ok(Grade {
                points: 0,
                status: ParticipantStatus::Skipped,
            });
        }
        let points = state
            .points
            .ok_or_else(|| FlowError::State("confirm step without points".to_string()))?;
        Ok(Grade {
            points,
            status: ParticipantStatus::Finished,
        })
    }
}

impl<A: AdminApi + 'static> FlowStep for ConfirmGradeStep<A> {
    async fn on_enter(&self, ctx: &StepContext<'_>) -> Result<(), FlowError> {
        let state: SubmissionState = ctx.state()?;
        let prompt = if state.skipped {
            format!("Mark <b>{}</b> as skipped?", self.action.participant_name)
        } else {
            let points = Self::grade(&state)?.points;
            format!("Give <b>{}</b> {points} points?", self.action.participant_name)
        };
        self.messenger
            .send_confirmation(ctx.chat_id(), &prompt, "grade:yes", "grade:no")
            .await?;
        Ok(())
    }

    async fn on_button(
        &self,
        ctx: &StepContext<'_>,
        callback: &CallbackData,
    ) -> Result<StepResult, FlowError> {
        if callback.name != "grade" {
            return Ok(StepResult::stay());
        }
        let result = match callback.param.as_str() {
            "yes" => {
                let state: SubmissionState = ctx.state()?;
                let grade = Self::grade(&state)?;
                match self
                    .api
                    .grade_participant(
                        ctx.user_id(),
                        self.action.event_id,
                        self.action.participant_id,
                        grade,
                    )
                    .await
                {
                    Ok(()) => {
                        info!(
                            user_id = ctx.user_id(),
                            event_id = self.action.event_id,
                            participant_id = %self.action.participant_id,
                            points = grade.points,
                            "grade recorded"
                        );
                        self.messenger
                            .send_message(ctx.chat_id(), "Saved.", None)
                            .await?;
                    }
                    Err(e) => {
                        warn!(user_id = ctx.user_id(), "grade submission failed: {e}");
                        self.messenger
                            .send_message(
                                ctx.chat_id(),
                                "Could not save the grade, please try again later.",
                                None,
                            )
                            .await?;
                    }
                }
                StepResult::finish()
            }
            "no" => {
                self.messenger
                    .send_message(ctx.chat_id(), "Discarded.", None)
                    .await?;
                StepResult::cancel()
            }
            _ => return Ok(StepResult::stay()),
        };

        // Back to a fresh queue rendering, whatever the outcome.
        (self.at_end)().await;
        Ok(result)
    }
}

/// Builds a submission flow per participant pick.
pub struct SubmissionFlows<A> {
    api: Arc<A>,
    messenger: Arc<BoxMessenger>,
}

impl<A> SubmissionFlows<A> {
    pub fn new(api: Arc<A>, messenger: Arc<BoxMessenger>) -> Self {
        Self { api, messenger }
    }
}

impl<A: AdminApi + 'static> ParticipantActionFlows for SubmissionFlows<A> {
    fn build(
        &self,
        action: &ParticipantAction,
        at_end: CompletionHook,
    ) -> (Arc<FlowDefinition>, Value) {
        let flow = FlowDefinition::new(FLOW_ID)
            .step(AskPointsStep {
                messenger: Arc::clone(&self.messenger),
                participant_name: action.participant_name.clone(),
            })
            .step(ConfirmGradeStep {
                api: Arc::clone(&self.api),
                messenger: Arc::clone(&self.messenger),
                action: action.clone(),
                at_end,
            });
        (Arc::new(flow), json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::test_support::{FakeApi, NullMessenger, manager_with};
    use proctor_types::event::InboundEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn action() -> ParticipantAction {
        ParticipantAction {
            user_id: 1,
            chat_id: 1,
            event_id: 5,
            subject_id: 3,
            participant_id: Uuid::now_v7(),
            participant_name: "Ivanova Ada".to_string(),
        }
    }

    fn counting_hook() -> (CompletionHook, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let hook: CompletionHook = Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        (hook, count)
    }

    #[tokio::test]
    async fn test_grade_path_records_and_runs_the_hook() {
        let api = Arc::new(FakeApi::default());
        let (manager, messenger) = manager_with(NullMessenger::default());
        let (hook, hook_runs) = counting_hook();
        let action = action();
        let (flow, state) =
            SubmissionFlows::new(Arc::clone(&api), messenger).build(&action, hook);

        manager.start(flow, 1, 1, state).await.unwrap();
        manager.dispatch(&InboundEvent::text(1, 1, 10, "87")).await.unwrap();
        manager
            .dispatch(&InboundEvent::button(1, 1, 11, "grade:yes"))
            .await
            .unwrap();

        let grades = api.grades.lock().unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].0, 5);
        assert_eq!(grades[0].1, action.participant_id);
        assert_eq!(
            grades[0].2,
            Grade {
                points: 87,
                status: ParticipantStatus::Finished
            }
        );
        assert_eq!(hook_runs.load(Ordering::SeqCst), 1);
        assert!(!manager.is_active(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_skip_path_marks_skipped_with_zero_points() {
        let api = Arc::new(FakeApi::default());
        let (manager, messenger) = manager_with(NullMessenger::default());
        let (hook, _) = counting_hook();
        let (flow, state) =
            SubmissionFlows::new(Arc::clone(&api), messenger).build(&action(), hook);

        manager.start(flow, 1, 1, state).await.unwrap();
        manager
            .dispatch(&InboundEvent::button(1, 1, 10, "grade:skip"))
            .await
            .unwrap();
        manager
            .dispatch(&InboundEvent::button(1, 1, 11, "grade:yes"))
            .await
            .unwrap();

        let grades = api.grades.lock().unwrap();
        assert_eq!(
            grades[0].2,
            Grade {
                points: 0,
                status: ParticipantStatus::Skipped
            }
        );
    }

    #[tokio::test]
    async fn test_out_of_range_points_repeat() {
        let api = Arc::new(FakeApi::default());
        let (manager, messenger) = manager_with(NullMessenger::default());
        let (hook, _) = counting_hook();
        let (flow, state) =
            SubmissionFlows::new(Arc::clone(&api), messenger).build(&action(), hook);

        manager.start(flow, 1, 1, state).await.unwrap();
        manager.dispatch(&InboundEvent::text(1, 1, 10, "140")).await.unwrap();

        assert!(manager.is_active(1).await.unwrap(), "still asking for points");
        assert!(api.grades.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declining_discards_but_still_resubscribes() {
        let api = Arc::new(FakeApi::default());
        let (manager, messenger) = manager_with(NullMessenger::default());
        let (hook, hook_runs) = counting_hook();
        let (flow, state) =
            SubmissionFlows::new(Arc::clone(&api), messenger).build(&action(), hook);

        manager.start(flow, 1, 1, state).await.unwrap();
        manager.dispatch(&InboundEvent::text(1, 1, 10, "87")).await.unwrap();
        manager
            .dispatch(&InboundEvent::button(1, 1, 11, "grade:no"))
            .await
            .unwrap();

        assert!(api.grades.lock().unwrap().is_empty());
        assert_eq!(hook_runs.load(Ordering::SeqCst), 1);
        assert!(!manager.is_active(1).await.unwrap());
    }
}
