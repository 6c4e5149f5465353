//! Flow definitions and the restart-lookup registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::step::{BoxFlowStep, FlowStep};

/// An ordered, immutable list of steps defining one guided interaction.
///
/// Definitions are constructed once (with their steps' collaborators
/// already injected) and shared via `Arc`.
pub struct FlowDefinition {
    id: &'static str,
    steps: Vec<BoxFlowStep>,
}

impl FlowDefinition {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            steps: Vec::new(),
        }
    }

    /// Append a step. Builder-style so flow constructors read top to
    /// bottom in step order.
    pub fn step<T: FlowStep + 'static>(mut self, step: T) -> Self {
        self.steps.push(BoxFlowStep::new(step));
        self
    }

    /// Stable identifier persisted into sessions so the right flow can
    /// be restored after a restart.
    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_at(&self, index: usize) -> Option<&BoxFlowStep> {
        self.steps.get(index)
    }
}

impl std::fmt::Debug for FlowDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowDefinition")
            .field("id", &self.id)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// Maps flow ids to shared definitions for resuming persisted sessions.
///
/// Only lifecycle-stable flows belong here. Flows built ad hoc around a
/// completion hook (the nested-flow pattern) are intentionally absent:
/// after a restart their sessions resolve to nothing and the engine
/// takes the reset path.
#[derive(Default)]
pub struct FlowRegistry {
    flows: HashMap<&'static str, Arc<FlowDefinition>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its own id. Last registration wins.
    pub fn register(&mut self, flow: Arc<FlowDefinition>) {
        self.flows.insert(flow.id(), flow);
    }

    pub fn get(&self, id: &str) -> Option<Arc<FlowDefinition>> {
        self.flows.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::step::{StepContext, StepResult};
    use proctor_types::error::FlowError;

    struct PromptStep;

    impl FlowStep for PromptStep {
        async fn on_text(
            &self,
            _ctx: &StepContext<'_>,
            _text: &str,
        ) -> Result<StepResult, FlowError> {
            Ok(StepResult::advance())
        }
    }

    #[test]
    fn test_definition_builder_preserves_order_and_len() {
        let flow = FlowDefinition::new("test").step(PromptStep).step(PromptStep);
        assert_eq!(flow.id(), "test");
        assert_eq!(flow.len(), 2);
        assert!(flow.step_at(1).is_some());
        assert!(flow.step_at(2).is_none());
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = FlowRegistry::new();
        registry.register(Arc::new(FlowDefinition::new("create_group").step(PromptStep)));

        assert!(registry.get("create_group").is_some());
        assert!(registry.get("missing").is_none());
    }
}
