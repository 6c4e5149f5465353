//! Business logic and port definitions for Proctor.
//!
//! This crate defines the conversation engine, the queue subscription
//! registry and the queue controller, plus the "ports" (traits) that the
//! infrastructure layer implements: session/token stores, the messaging
//! endpoint, the backend data provider and the upstream real-time
//! channel. It depends only on `proctor-types` -- never on
//! `proctor-infra` or any database/IO crate.

pub mod engine;
pub mod flow;
pub mod messenger;
pub mod provider;
pub mod queue;
pub mod registry;
pub mod router;
