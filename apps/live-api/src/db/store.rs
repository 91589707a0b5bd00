use async_trait::async_trait;
use diesel_async::pooled_connection::deadpool::PoolError;

use crate::models::live_session::{Attendee, LiveSession, LiveStatus, NewLiveSession};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Stream details written alongside the transition into `live`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAssignment {
    pub delivery_url: String,
    pub stream_key: String,
}

/// Optional filters for listing sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<LiveStatus>,
    pub tutor_id: Option<String>,
}

/// Persistence for live sessions.
///
/// Backed by PostgreSQL in production and an in-memory map in tests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: NewLiveSession) -> Result<LiveSession, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<LiveSession>, StoreError>;

    /// Sessions matching `filter`, ordered by `scheduled_at`.
    async fn list(&self, filter: &SessionFilter) -> Result<Vec<LiveSession>, StoreError>;

    /// Compare-and-set status write.
    ///
    /// Applies only while the stored status still equals `from`; returns
    /// `None` otherwise. Stream fields are written only when `stream` is set.
    async fn transition(
        &self,
        id: &str,
        from: LiveStatus,
        to: LiveStatus,
        stream: Option<StreamAssignment>,
    ) -> Result<Option<LiveSession>, StoreError>;

    /// Append an attendee to the session owning `room_id`.
    ///
    /// Returns the session id, or `None` if no session has that room.
    async fn record_attendee(
        &self,
        room_id: &str,
        viewer_id: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Attendees of a session in join order.
    async fn attendees(&self, session_id: &str) -> Result<Vec<Attendee>, StoreError>;
}
