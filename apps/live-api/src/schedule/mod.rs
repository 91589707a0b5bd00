//! Live session lifecycle: creation, timing checks and status transitions.

mod service;

pub use service::{NewSchedule, ScheduleService};

use chrono::{DateTime, Duration, Utc};

use crate::db::StoreError;
use crate::models::live_session::LiveStatus;
use crate::upstream::GatewayError;

/// How long before `scheduled_at` a session may go live.
pub const START_WINDOW_MINUTES: i64 = 5;

/// Whether a session scheduled at `scheduled_at` may start at `now`.
/// The window boundary is inclusive.
pub fn can_start_at(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= opens_at(scheduled_at)
}

pub fn opens_at(scheduled_at: DateTime<Utc>) -> DateTime<Utc> {
    scheduled_at - Duration::minutes(START_WINDOW_MINUTES)
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("live session {0} not found")]
    NotFound(String),
    #[error("cannot move a {from} session to {to}")]
    InvalidTransition { from: LiveStatus, to: LiveStatus },
    #[error("session cannot start before {opens_at}")]
    TooEarly { opens_at: DateTime<Utc> },
    #[error("could not start the stream: {0}")]
    UpstreamStartFailed(#[source] GatewayError),
    /// Never blocks a status write; logged by the caller.
    #[error("could not stop the stream: {0}")]
    UpstreamStopFailed(#[source] GatewayError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn start_window_is_inclusive() {
        let scheduled = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();

        assert!(!can_start_at(scheduled, scheduled - Duration::minutes(10)));
        assert!(!can_start_at(
            scheduled,
            scheduled - Duration::minutes(5) - Duration::seconds(1)
        ));
        assert!(can_start_at(scheduled, scheduled - Duration::minutes(5)));
        assert!(can_start_at(scheduled, scheduled));
        assert!(can_start_at(scheduled, scheduled + Duration::hours(3)));
    }
}
