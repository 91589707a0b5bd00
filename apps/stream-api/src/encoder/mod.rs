//! Encoder process management: command construction, spawning and supervision.

pub mod args;
pub mod manager;
pub mod process;

use std::io;
use std::path::PathBuf;

pub use args::{CaptureDevice, CommandSpec, EncoderSettings};
pub use manager::{ActiveEncode, EncoderManager, StartedEncode, StopOutcome};
pub use process::{ProcessControl, SystemProcessControl};

#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("session {0} already has an active encoder")]
    AlreadyEncoding(String),

    #[error("failed to terminate encoder for session {session_id}: {source}")]
    TerminationFailed {
        session_id: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn encoder for session {session_id}: {source}")]
    Spawn {
        session_id: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to prepare output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
