//! Conversation flow definitions.
//!
//! A flow is an ordered, immutable list of steps; a step is a set of up
//! to three handlers (`on_enter`, `on_text`, `on_button`) plus the
//! transition its response handlers return. Steps have no knowledge of
//! their neighbors -- the engine owns all movement between them.

pub mod definition;
pub mod step;

pub use definition::{FlowDefinition, FlowRegistry};
pub use step::{BoxFlowStep, FlowStep, StepContext, StepResult, Transition};
