use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::store::{SessionFilter, SessionStore, StoreError, StreamAssignment};
use crate::models::live_session::{Attendee, LiveSession, LiveStatus, NewLiveSession};

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, LiveSession>,
    attendees: HashMap<String, Vec<Attendee>>,
}

/// In-process session store used by tests and `STORE=memory`.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Tables>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: NewLiveSession) -> Result<LiveSession, StoreError> {
        let row = LiveSession {
            id: session.id,
            tutor_id: session.tutor_id,
            course_id: session.course_id,
            title: session.title,
            description: session.description,
            scheduled_at: session.scheduled_at,
            duration_minutes: session.duration_minutes,
            status: session.status,
            room_id: session.room_id,
            delivery_url: None,
            stream_key: None,
            created_at: session.created_at,
            updated_at: session.updated_at,
        };
        self.inner
            .lock()
            .sessions
            .insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn get(&self, id: &str) -> Result<Option<LiveSession>, StoreError> {
        Ok(self.inner.lock().sessions.get(id).cloned())
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<LiveSession>, StoreError> {
        let tables = self.inner.lock();
        let mut rows: Vec<LiveSession> = tables
            .sessions
            .values()
            .filter(|s| filter.status.map_or(true, |status| s.status == status))
            .filter(|s| {
                filter
                    .tutor_id
                    .as_deref()
                    .map_or(true, |tutor| s.tutor_id == tutor)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    async fn transition(
        &self,
        id: &str,
        from: LiveStatus,
        to: LiveStatus,
        stream: Option<StreamAssignment>,
    ) -> Result<Option<LiveSession>, StoreError> {
        let mut tables = self.inner.lock();
        let Some(row) = tables.sessions.get_mut(id) else {
            return Ok(None);
        };
        if row.status != from {
            return Ok(None);
        }

        row.status = to;
        if let Some(stream) = stream {
            row.delivery_url = Some(stream.delivery_url);
            row.stream_key = Some(stream.stream_key);
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn record_attendee(
        &self,
        room_id: &str,
        viewer_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut tables = self.inner.lock();
        let Some(session_id) = tables
            .sessions
            .values()
            .find(|s| s.room_id == room_id)
            .map(|s| s.id.clone())
        else {
            return Ok(None);
        };

        tables
            .attendees
            .entry(session_id.clone())
            .or_default()
            .push(Attendee {
                viewer_id: viewer_id.to_string(),
                joined_at: Utc::now(),
            });
        Ok(Some(session_id))
    }

    async fn attendees(&self, session_id: &str) -> Result<Vec<Attendee>, StoreError> {
        Ok(self
            .inner
            .lock()
            .attendees
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn new_session(id: &str, tutor: &str, offset_minutes: i64) -> NewLiveSession {
        let now = Utc::now();
        NewLiveSession {
            id: id.to_string(),
            tutor_id: tutor.to_string(),
            course_id: "crs_1".to_string(),
            title: "Algebra".to_string(),
            description: None,
            scheduled_at: now + Duration::minutes(offset_minutes),
            duration_minutes: 60,
            status: LiveStatus::Scheduled,
            room_id: format!("room_{id}"),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = MemorySessionStore::new();
        store.insert(new_session("a", "t1", 0)).await.unwrap();

        let stream = StreamAssignment {
            delivery_url: "http://cdn/live_a/index.m3u8".into(),
            stream_key: "live_a".into(),
        };
        let live = store
            .transition("a", LiveStatus::Scheduled, LiveStatus::Live, Some(stream))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.status, LiveStatus::Live);
        assert_eq!(live.stream_key.as_deref(), Some("live_a"));

        // Stale expectation does not apply.
        let stale = store
            .transition("a", LiveStatus::Scheduled, LiveStatus::Canceled, None)
            .await
            .unwrap();
        assert!(stale.is_none());

        let done = store
            .transition("a", LiveStatus::Live, LiveStatus::Completed, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, LiveStatus::Completed);
        assert_eq!(done.delivery_url.as_deref(), Some("http://cdn/live_a/index.m3u8"));
    }

    #[tokio::test]
    async fn list_filters_and_orders_by_schedule() {
        let store = MemorySessionStore::new();
        store.insert(new_session("late", "t1", 60)).await.unwrap();
        store.insert(new_session("early", "t1", 10)).await.unwrap();
        store.insert(new_session("other", "t2", 0)).await.unwrap();

        let filter = SessionFilter {
            tutor_id: Some("t1".into()),
            ..Default::default()
        };
        let ids: Vec<String> = store
            .list(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["early", "late"]);

        let filter = SessionFilter {
            status: Some(LiveStatus::Live),
            ..Default::default()
        };
        assert!(store.list(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn attendee_is_recorded_against_room_owner() {
        let store = MemorySessionStore::new();
        store.insert(new_session("a", "t1", 0)).await.unwrap();

        let owner = store.record_attendee("room_a", "ana").await.unwrap();
        assert_eq!(owner.as_deref(), Some("a"));
        assert!(store
            .record_attendee("room_missing", "ana")
            .await
            .unwrap()
            .is_none());

        let attendees = store.attendees("a").await.unwrap();
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].viewer_id, "ana");
    }
}
