use std::sync::Arc;

use chrono::{DateTime, Utc};
use lectern_common::id::{prefix, prefixed_ulid};
use lectern_common::PrefixedId;

use super::{can_start_at, opens_at, ScheduleError};
use crate::db::{SessionFilter, SessionStore, StreamAssignment};
use crate::models::live_session::{Attendee, LiveSession, LiveStatus, NewLiveSession};
use crate::upstream::StreamingGateway;

/// Validated input for a new session.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub tutor_id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
}

/// Owns the session lifecycle and drives the streaming gateway on transitions.
pub struct ScheduleService {
    store: Arc<dyn SessionStore>,
    gateway: Arc<dyn StreamingGateway>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn SessionStore>, gateway: Arc<dyn StreamingGateway>) -> Self {
        Self { store, gateway }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub async fn create(&self, input: NewSchedule) -> Result<LiveSession, ScheduleError> {
        let now = Utc::now();
        let session = self
            .store
            .insert(NewLiveSession {
                id: LiveSession::generate(),
                tutor_id: input.tutor_id,
                course_id: input.course_id,
                title: input.title,
                description: input.description,
                scheduled_at: input.scheduled_at,
                duration_minutes: input.duration_minutes,
                status: LiveStatus::Scheduled,
                room_id: prefixed_ulid(prefix::ROOM),
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(
            session_id = %session.id,
            room_id = %session.room_id,
            scheduled_at = %session.scheduled_at,
            "live session scheduled"
        );
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> Result<LiveSession, ScheduleError> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(session_id.to_string()))
    }

    pub async fn attendees(&self, session_id: &str) -> Result<Vec<Attendee>, ScheduleError> {
        Ok(self.store.attendees(session_id).await?)
    }

    pub async fn list(&self, filter: &SessionFilter) -> Result<Vec<LiveSession>, ScheduleError> {
        Ok(self.store.list(filter).await?)
    }

    pub async fn check_can_start(&self, session_id: &str) -> Result<bool, ScheduleError> {
        self.check_can_start_at(session_id, Utc::now()).await
    }

    pub async fn check_can_start_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, ScheduleError> {
        let session = self.get(session_id).await?;
        Ok(can_start_at(session.scheduled_at, now))
    }

    pub async fn change_status(
        &self,
        session_id: &str,
        target: LiveStatus,
        bearer: &str,
    ) -> Result<LiveSession, ScheduleError> {
        self.change_status_at(session_id, target, bearer, Utc::now())
            .await
    }

    /// Apply a status transition as of `now`.
    ///
    /// The edge is validated before any gateway call. Going live persists
    /// only after the gateway has started the stream.
    pub async fn change_status_at(
        &self,
        session_id: &str,
        target: LiveStatus,
        bearer: &str,
        now: DateTime<Utc>,
    ) -> Result<LiveSession, ScheduleError> {
        let session = self.get(session_id).await?;
        let from = session.status;

        if !from.can_transition_to(target) {
            return Err(ScheduleError::InvalidTransition { from, to: target });
        }

        match (from, target) {
            (LiveStatus::Scheduled, LiveStatus::Live) => {
                if !can_start_at(session.scheduled_at, now) {
                    return Err(ScheduleError::TooEarly {
                        opens_at: opens_at(session.scheduled_at),
                    });
                }
                self.go_live(session_id, bearer).await
            }
            (LiveStatus::Live, _) => {
                if let Err(err) = self.stop_stream(session_id, bearer).await {
                    tracing::warn!(
                        session_id,
                        error = %err,
                        "upstream stop failed; recording status anyway"
                    );
                }
                self.write_status(session_id, from, target).await
            }
            _ => self.write_status(session_id, from, target).await,
        }
    }

    async fn go_live(&self, session_id: &str, bearer: &str) -> Result<LiveSession, ScheduleError> {
        let started = self
            .gateway
            .start(session_id, bearer)
            .await
            .map_err(|err| {
                tracing::warn!(session_id, error = %err, "upstream start failed");
                ScheduleError::UpstreamStartFailed(err)
            })?;

        let stream = StreamAssignment {
            delivery_url: started.url,
            stream_key: started.stream_key,
        };

        match self
            .store
            .transition(session_id, LiveStatus::Scheduled, LiveStatus::Live, Some(stream))
            .await
        {
            Ok(Some(session)) => {
                tracing::info!(
                    session_id,
                    delivery_url = session.delivery_url.as_deref().unwrap_or_default(),
                    "live session started"
                );
                Ok(session)
            }
            Ok(None) => {
                self.stop_quietly(session_id, bearer).await;
                Err(self.lost_race(session_id, LiveStatus::Live).await)
            }
            Err(err) => {
                self.stop_quietly(session_id, bearer).await;
                Err(err.into())
            }
        }
    }

    async fn write_status(
        &self,
        session_id: &str,
        from: LiveStatus,
        to: LiveStatus,
    ) -> Result<LiveSession, ScheduleError> {
        match self.store.transition(session_id, from, to, None).await? {
            Some(session) => {
                tracing::info!(session_id, %from, %to, "live session status changed");
                Ok(session)
            }
            None => Err(self.lost_race(session_id, to).await),
        }
    }

    /// Error for a compare-and-set that found a different status.
    async fn lost_race(&self, session_id: &str, to: LiveStatus) -> ScheduleError {
        match self.store.get(session_id).await {
            Ok(Some(current)) => ScheduleError::InvalidTransition {
                from: current.status,
                to,
            },
            Ok(None) => ScheduleError::NotFound(session_id.to_string()),
            Err(err) => err.into(),
        }
    }

    async fn stop_stream(&self, session_id: &str, bearer: &str) -> Result<(), ScheduleError> {
        self.gateway
            .stop(session_id, bearer)
            .await
            .map_err(ScheduleError::UpstreamStopFailed)
    }

    async fn stop_quietly(&self, session_id: &str, bearer: &str) {
        if let Err(err) = self.stop_stream(session_id, bearer).await {
            tracing::error!(
                session_id,
                error = %err,
                "could not stop stream after failed status write"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration;
    use parking_lot::Mutex;

    use super::*;
    use crate::db::MemorySessionStore;
    use crate::upstream::{GatewayError, StreamStarted};

    #[derive(Default)]
    struct FakeGateway {
        fail_start: bool,
        fail_stop: bool,
        /// Cancels the session in this store while the start is in flight.
        cancel_during_start: Option<Arc<MemorySessionStore>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StreamingGateway for FakeGateway {
        async fn start(
            &self,
            session_id: &str,
            bearer: &str,
        ) -> Result<StreamStarted, GatewayError> {
            self.calls.lock().push(format!("start {session_id} {bearer}"));
            if self.fail_start {
                return Err(GatewayError::Rejected {
                    status: 500,
                    message: "spawn failed".into(),
                });
            }
            if let Some(store) = &self.cancel_during_start {
                store
                    .transition(session_id, LiveStatus::Scheduled, LiveStatus::Canceled, None)
                    .await
                    .unwrap();
            }
            Ok(StreamStarted {
                url: format!("http://cdn.test/hls/live_{session_id}/index.m3u8"),
                stream_key: format!("live_{session_id}"),
            })
        }

        async fn stop(&self, session_id: &str, bearer: &str) -> Result<(), GatewayError> {
            self.calls.lock().push(format!("stop {session_id} {bearer}"));
            if self.fail_stop {
                return Err(GatewayError::Rejected {
                    status: 500,
                    message: "kill refused".into(),
                });
            }
            Ok(())
        }
    }

    fn service(gateway: FakeGateway) -> (ScheduleService, Arc<FakeGateway>) {
        let gateway = Arc::new(gateway);
        let service = ScheduleService::new(Arc::new(MemorySessionStore::new()), gateway.clone());
        (service, gateway)
    }

    fn lesson(scheduled_at: DateTime<Utc>) -> NewSchedule {
        NewSchedule {
            tutor_id: "usr_tutor".into(),
            course_id: "crs_algebra".into(),
            title: "Quadratic equations".into(),
            description: None,
            scheduled_at,
            duration_minutes: 45,
        }
    }

    #[tokio::test]
    async fn create_starts_scheduled_with_room() {
        let (service, _) = service(FakeGateway::default());
        let session = service.create(lesson(Utc::now())).await.unwrap();

        assert!(session.id.starts_with("lvs_"));
        assert!(session.room_id.starts_with("room_"));
        assert_eq!(session.status, LiveStatus::Scheduled);
        assert!(session.delivery_url.is_none());
    }

    #[tokio::test]
    async fn going_live_persists_stream_details() {
        let (service, gateway) = service(FakeGateway::default());
        let at = Utc::now();
        let session = service.create(lesson(at)).await.unwrap();

        let live = service
            .change_status_at(&session.id, LiveStatus::Live, "tok", at)
            .await
            .unwrap();

        assert_eq!(live.status, LiveStatus::Live);
        assert_eq!(
            live.delivery_url,
            Some(format!("http://cdn.test/hls/live_{}/index.m3u8", session.id))
        );
        assert_eq!(*gateway.calls.lock(), vec![format!("start {} tok", session.id)]);
    }

    #[tokio::test]
    async fn failed_start_leaves_session_scheduled() {
        let (service, _) = service(FakeGateway {
            fail_start: true,
            ..Default::default()
        });
        let at = Utc::now();
        let session = service.create(lesson(at)).await.unwrap();

        let err = service
            .change_status_at(&session.id, LiveStatus::Live, "tok", at)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::UpstreamStartFailed(_)));

        let stored = service.get(&session.id).await.unwrap();
        assert_eq!(stored.status, LiveStatus::Scheduled);
        assert!(stored.delivery_url.is_none());
        assert!(stored.stream_key.is_none());
    }

    #[tokio::test]
    async fn too_early_is_rejected_without_gateway_call() {
        let (service, gateway) = service(FakeGateway::default());
        let at = Utc::now();
        let session = service.create(lesson(at)).await.unwrap();

        let err = service
            .change_status_at(&session.id, LiveStatus::Live, "tok", at - Duration::minutes(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::TooEarly { .. }));
        assert!(gateway.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn stop_failure_does_not_block_completion() {
        let (service, gateway) = service(FakeGateway {
            fail_stop: true,
            ..Default::default()
        });
        let at = Utc::now();
        let session = service.create(lesson(at)).await.unwrap();
        service
            .change_status_at(&session.id, LiveStatus::Live, "tok", at)
            .await
            .unwrap();

        let done = service
            .change_status(&session.id, LiveStatus::Completed, "tok")
            .await
            .unwrap();
        assert_eq!(done.status, LiveStatus::Completed);
        assert!(done.delivery_url.is_some());
        assert_eq!(gateway.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn stop_failure_is_typed() {
        let (service, _) = service(FakeGateway {
            fail_stop: true,
            ..Default::default()
        });
        let err = service.stop_stream("lvs_1", "tok").await.unwrap_err();
        assert!(matches!(err, ScheduleError::UpstreamStopFailed(_)));
    }

    #[tokio::test]
    async fn aborting_a_live_session_stops_the_stream() {
        let (service, gateway) = service(FakeGateway::default());
        let at = Utc::now();
        let session = service.create(lesson(at)).await.unwrap();
        service
            .change_status_at(&session.id, LiveStatus::Live, "tok", at)
            .await
            .unwrap();

        let canceled = service
            .change_status(&session.id, LiveStatus::Canceled, "tok")
            .await
            .unwrap();

        assert_eq!(canceled.status, LiveStatus::Canceled);
        assert!(canceled.delivery_url.is_some());
        assert_eq!(
            *gateway.calls.lock(),
            vec![
                format!("start {} tok", session.id),
                format!("stop {} tok", session.id),
            ]
        );
    }

    #[tokio::test]
    async fn losing_the_race_after_start_stops_the_stream() {
        let store = Arc::new(MemorySessionStore::new());
        let gateway = Arc::new(FakeGateway {
            cancel_during_start: Some(store.clone()),
            ..Default::default()
        });
        let service = ScheduleService::new(store.clone(), gateway.clone());
        let at = Utc::now();
        let session = service.create(lesson(at)).await.unwrap();

        let err = service
            .change_status_at(&session.id, LiveStatus::Live, "tok", at)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::InvalidTransition {
                from: LiveStatus::Canceled,
                to: LiveStatus::Live
            }
        ));
        assert_eq!(
            *gateway.calls.lock(),
            vec![
                format!("start {} tok", session.id),
                format!("stop {} tok", session.id),
            ]
        );

        let stored = service.get(&session.id).await.unwrap();
        assert_eq!(stored.status, LiveStatus::Canceled);
        assert!(stored.delivery_url.is_none());
        assert!(stored.stream_key.is_none());
    }

    #[tokio::test]
    async fn terminal_states_reject_transitions() {
        let (service, gateway) = service(FakeGateway::default());
        let session = service.create(lesson(Utc::now())).await.unwrap();
        service
            .change_status(&session.id, LiveStatus::Canceled, "tok")
            .await
            .unwrap();

        let err = service
            .change_status(&session.id, LiveStatus::Live, "tok")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::InvalidTransition {
                from: LiveStatus::Canceled,
                to: LiveStatus::Live
            }
        ));
        // Canceling a scheduled session never touches the gateway.
        assert!(gateway.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (service, _) = service(FakeGateway::default());
        let err = service.check_can_start("lvs_missing").await.unwrap_err();
        assert!(matches!(err, ScheduleError::NotFound(_)));
    }
}
