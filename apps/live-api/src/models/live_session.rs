use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use lectern_common::id::prefix;
use lectern_common::PrefixedId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::{live_session_attendees, live_sessions};

/// Lifecycle of a live class.
///
/// Legal edges: `scheduled → live`, `scheduled → canceled`,
/// `live → completed`, `live → canceled`. `completed` and `canceled` are
/// terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum LiveStatus {
    Scheduled,
    Live,
    Completed,
    Canceled,
}

impl LiveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LiveStatus::Scheduled => "scheduled",
            LiveStatus::Live => "live",
            LiveStatus::Completed => "completed",
            LiveStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LiveStatus::Completed | LiveStatus::Canceled)
    }

    pub fn can_transition_to(self, target: LiveStatus) -> bool {
        matches!(
            (self, target),
            (LiveStatus::Scheduled, LiveStatus::Live)
                | (LiveStatus::Scheduled, LiveStatus::Canceled)
                | (LiveStatus::Live, LiveStatus::Completed)
                | (LiveStatus::Live, LiveStatus::Canceled)
        )
    }
}

impl fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(LiveStatus::Scheduled),
            "live" => Ok(LiveStatus::Live),
            "completed" => Ok(LiveStatus::Completed),
            "canceled" => Ok(LiveStatus::Canceled),
            other => Err(format!("unknown live status: {other}")),
        }
    }
}

impl ToSql<Text, Pg> for LiveStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for LiveStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        raw.parse().map_err(Into::into)
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = live_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LiveSession {
    pub id: String,
    pub tutor_id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: LiveStatus,
    pub room_id: String,
    pub delivery_url: Option<String>,
    pub stream_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrefixedId for LiveSession {
    const PREFIX: &'static str = prefix::LIVE_SESSION;
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = live_sessions)]
pub struct NewLiveSession {
    pub id: String,
    pub tutor_id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: LiveStatus,
    pub room_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status write. `None` stream fields are left untouched.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = live_sessions)]
pub struct StatusChange {
    pub status: LiveStatus,
    pub delivery_url: Option<String>,
    pub stream_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = live_session_attendees)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Attendee {
    pub viewer_id: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = live_session_attendees)]
pub struct NewAttendee<'a> {
    pub session_id: &'a str,
    pub viewer_id: &'a str,
    pub joined_at: DateTime<Utc>,
}
