use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::AsyncConnection;
use scoped_futures::ScopedFutureExt;

use super::pool::DbPool;
use super::schema::{live_session_attendees, live_sessions};
use super::store::{SessionFilter, SessionStore, StoreError, StreamAssignment};
use crate::models::live_session::{
    Attendee, LiveSession, LiveStatus, NewAttendee, NewLiveSession, StatusChange,
};

/// PostgreSQL-backed session store.
#[derive(Clone)]
pub struct PgSessionStore {
    db: DbPool,
}

impl PgSessionStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: NewLiveSession) -> Result<LiveSession, StoreError> {
        let mut conn = self.db.get().await?;
        let row = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(live_sessions::table)
                .values(&session)
                .returning(LiveSession::as_returning()),
            &mut conn,
        )
        .await?;
        Ok(row)
    }

    async fn get(&self, id: &str) -> Result<Option<LiveSession>, StoreError> {
        let mut conn = self.db.get().await?;
        let row = diesel_async::RunQueryDsl::get_result(
            live_sessions::table
                .find(id)
                .select(LiveSession::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(row)
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<LiveSession>, StoreError> {
        let mut conn = self.db.get().await?;

        let mut query = live_sessions::table
            .order((live_sessions::scheduled_at.asc(), live_sessions::id.asc()))
            .select(LiveSession::as_select())
            .into_boxed();

        if let Some(status) = filter.status {
            query = query.filter(live_sessions::status.eq(status));
        }

        if let Some(ref tutor_id) = filter.tutor_id {
            query = query.filter(live_sessions::tutor_id.eq(tutor_id));
        }

        let rows = diesel_async::RunQueryDsl::load(query, &mut conn).await?;
        Ok(rows)
    }

    async fn transition(
        &self,
        id: &str,
        from: LiveStatus,
        to: LiveStatus,
        stream: Option<StreamAssignment>,
    ) -> Result<Option<LiveSession>, StoreError> {
        let (delivery_url, stream_key) = match stream {
            Some(s) => (Some(s.delivery_url), Some(s.stream_key)),
            None => (None, None),
        };
        let change = StatusChange {
            status: to,
            delivery_url,
            stream_key,
            updated_at: Utc::now(),
        };

        let mut conn = self.db.get().await?;
        let row = diesel_async::RunQueryDsl::get_result(
            diesel::update(
                live_sessions::table
                    .filter(live_sessions::id.eq(id))
                    .filter(live_sessions::status.eq(from)),
            )
            .set(&change)
            .returning(LiveSession::as_returning()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(row)
    }

    async fn record_attendee(
        &self,
        room_id: &str,
        viewer_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let room_id = room_id.to_string();
        let viewer_id = viewer_id.to_string();
        let mut conn = self.db.get().await?;

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let session_id: Option<String> = diesel_async::RunQueryDsl::get_result(
                    live_sessions::table
                        .filter(live_sessions::room_id.eq(&room_id))
                        .select(live_sessions::id),
                    conn,
                )
                .await
                .optional()?;

                let Some(session_id) = session_id else {
                    return Ok(None);
                };

                diesel_async::RunQueryDsl::execute(
                    diesel::insert_into(live_session_attendees::table).values(NewAttendee {
                        session_id: &session_id,
                        viewer_id: &viewer_id,
                        joined_at: Utc::now(),
                    }),
                    conn,
                )
                .await?;

                Ok(Some(session_id))
            }
            .scope_boxed()
        })
        .await
    }

    async fn attendees(&self, session_id: &str) -> Result<Vec<Attendee>, StoreError> {
        let mut conn = self.db.get().await?;
        let rows = diesel_async::RunQueryDsl::load(
            live_session_attendees::table
                .filter(live_session_attendees::session_id.eq(session_id))
                .order(live_session_attendees::id.asc())
                .select(Attendee::as_select()),
            &mut conn,
        )
        .await?;
        Ok(rows)
    }
}
