//! The backend data provider port.
//!
//! Read-only access to queue data served by the education-management
//! API. Requests are made on behalf of a specific admin user because the
//! backend authenticates each bot user with their own bearer token.

use std::future::Future;

use proctor_types::error::ApiError;
use proctor_types::queue::{ParticipantStatus, QueueDetail, QueueSummary};
use proctor_types::{EventId, UserId};
use uuid::Uuid;

/// Read-only queue data access. Uses RPITIT; the reqwest-backed
/// implementation lives in proctor-infra.
pub trait QueueDataProvider: Send + Sync {
    /// Fetch the full participant list of one queue event.
    ///
    /// Returns `ApiError::NotFound` for an unknown event id (stale UI
    /// references make this a routine outcome, not a fault).
    fn queue_detail(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> impl Future<Output = Result<QueueDetail, ApiError>> + Send;

    /// List the currently open queue events.
    fn list_queues(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<QueueSummary>, ApiError>> + Send;
}

/// Points plus resulting status for one graded submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub points: i32,
    pub status: ParticipantStatus,
}

/// Backend mutations performed by the conversation flows.
pub trait AdminApi: Send + Sync {
    /// Register the calling admin under their full name.
    fn register_admin(
        &self,
        user_id: UserId,
        full_name: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Create a study group.
    fn create_group(
        &self,
        user_id: UserId,
        name: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Record the grade of one queue participant.
    fn grade_participant(
        &self,
        user_id: UserId,
        event_id: EventId,
        participant_id: Uuid,
        grade: Grade,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
