//! Wire format of the presence channel.
//!
//! Every frame in either direction is `{ "event": <name>, "data": {...} }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JOIN: &str = "join";
pub const LEAVE: &str = "leave";
pub const SEND_COMMENT: &str = "send_comment";
pub const RECEIVE_COMMENT: &str = "receive_comment";
pub const UPDATE_VIEWER_COUNT: &str = "update_viewer_count";
pub const ERROR: &str = "error";

/// A frame received from a viewer.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// A frame sent to viewers.
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    pub event: &'static str,
    pub data: Value,
}

impl ServerFrame {
    pub fn viewer_count(room_id: &str, count: usize) -> Self {
        Self {
            event: UPDATE_VIEWER_COUNT,
            data: serde_json::json!({ "room_id": room_id, "count": count }),
        }
    }

    /// Comments are relayed exactly as the sender wrote them.
    pub fn comment(data: Value) -> Self {
        Self {
            event: RECEIVE_COMMENT,
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event: ERROR,
            data: serde_json::json!({ "message": message.into() }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JoinPayload {
    pub room_id: String,
    pub viewer_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LeavePayload {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentPayload {
    pub room_id: String,
    pub comment: Value,
}
