//! Concrete conversation flows.
//!
//! Each flow is a function (or factory) producing a `FlowDefinition`
//! whose steps carry their collaborators. `create_group` and `register`
//! are static flows registered in the `FlowRegistry`, so they resume
//! across restarts. The submission and queue-pick flows capture
//! per-invocation state (completion hooks, the picked participant) and
//! therefore live only as long as the process; a restart mid-flow lands
//! in the engine's reset path.

pub mod create_group;
pub mod list_queues;
pub mod register;
pub mod submission;

#[cfg(test)]
pub(crate) mod test_support;

pub use create_group::create_group_flow;
pub use list_queues::list_queues_flow;
pub use register::register_flow;
pub use submission::SubmissionFlows;
