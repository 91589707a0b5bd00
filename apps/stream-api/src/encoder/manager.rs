//! Ownership of running encoder processes, one per live session.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lectern_common::stream::{self, PLAYLIST_FILE};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::process::Child;
use tokio::sync::watch;
use utoipa::ToSchema;

use super::args::{CommandSpec, EncoderSettings};
use super::process::ProcessControl;
use super::EncoderError;

/// In-memory record binding a session to its encoder process.
struct EncodeHandle {
    pid: u32,
    stream_key: String,
    delivery_path: String,
    started_at: DateTime<Utc>,
    /// Distinguishes successive encodes of the same session so a late exit
    /// observer never removes a newer handle.
    generation: u64,
    /// Flips to `true` once the exit observer has reaped the process.
    exited: watch::Receiver<bool>,
}

/// Result of a successful start.
#[derive(Debug, Clone)]
pub struct StartedEncode {
    pub pid: u32,
    pub stream_key: String,
    /// Playlist path relative to the HLS base (`<stream key>/index.m3u8`).
    pub delivery_path: String,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

/// Snapshot of one running encode.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActiveEncode {
    pub session_id: String,
    pub pid: u32,
    pub stream_key: String,
    pub delivery_path: String,
    pub started_at: DateTime<Utc>,
}

type HandleMap = Arc<Mutex<HashMap<String, EncodeHandle>>>;

/// Tracks at most one encoder process per session.
///
/// The handle map is the single source of truth for "is this session still
/// encoding". Every access goes through one `parking_lot::Mutex`, never held
/// across an `.await`.
pub struct EncoderManager {
    settings: EncoderSettings,
    process: Arc<dyn ProcessControl>,
    handles: HandleMap,
    next_generation: AtomicU64,
}

impl EncoderManager {
    pub fn new(settings: EncoderSettings, process: Arc<dyn ProcessControl>) -> Self {
        Self {
            settings,
            process,
            handles: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Spawn the encoder for `session_id`.
    ///
    /// Fails with [`EncoderError::AlreadyEncoding`] if a handle already exists.
    pub async fn start(&self, session_id: &str) -> Result<StartedEncode, EncoderError> {
        if self.is_encoding(session_id) {
            return Err(EncoderError::AlreadyEncoding(session_id.to_string()));
        }

        let stream_key = stream::stream_key(session_id);
        let output_dir = self.settings.output_dir(&stream_key);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| EncoderError::OutputDir {
                path: output_dir.clone(),
                source,
            })?;

        let spec = self.settings.command_for(&output_dir);
        let delivery_path = format!("{stream_key}/{PLAYLIST_FILE}");
        let pid = self.spawn_and_register(session_id, &spec, &stream_key, &delivery_path)?;

        tracing::info!(
            session_id,
            pid,
            stream_key = %stream_key,
            output_dir = %output_dir.display(),
            "encoder started"
        );

        Ok(StartedEncode {
            pid,
            stream_key,
            delivery_path,
            output_dir,
        })
    }

    /// Spawn, insert the handle and attach the exit observer under one lock so
    /// that neither a concurrent start nor an early exit can slip in between.
    fn spawn_and_register(
        &self,
        session_id: &str,
        spec: &CommandSpec,
        stream_key: &str,
        delivery_path: &str,
    ) -> Result<u32, EncoderError> {
        let mut handles = self.handles.lock();
        if handles.contains_key(session_id) {
            return Err(EncoderError::AlreadyEncoding(session_id.to_string()));
        }

        let spawn_err = |source| EncoderError::Spawn {
            session_id: session_id.to_string(),
            source,
        };
        let child = self.process.spawn(spec).map_err(spawn_err)?;
        let pid = child.id().ok_or_else(|| {
            spawn_err(std::io::Error::other("encoder exited before reporting a pid"))
        })?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (exit_tx, exit_rx) = watch::channel(false);
        handles.insert(
            session_id.to_string(),
            EncodeHandle {
                pid,
                stream_key: stream_key.to_string(),
                delivery_path: delivery_path.to_string(),
                started_at: Utc::now(),
                generation,
                exited: exit_rx,
            },
        );
        self.observe_exit(session_id.to_string(), generation, child, exit_tx);

        Ok(pid)
    }

    fn observe_exit(
        &self,
        session_id: String,
        generation: u64,
        mut child: Child,
        exit_tx: watch::Sender<bool>,
    ) {
        let handles = Arc::clone(&self.handles);
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::info!(session_id = %session_id, "encoder exited");
                }
                Ok(status) => {
                    tracing::warn!(session_id = %session_id, %status, "encoder exited abnormally");
                }
                Err(e) => {
                    tracing::error!(session_id = %session_id, ?e, "failed to wait on encoder");
                }
            }
            remove_if_current(&handles, &session_id, generation);
            let _ = exit_tx.send(true);
        });
    }

    /// Kill the encoder for `session_id` and wait until it has been reaped.
    ///
    /// Stopping a session with no handle is not an error.
    pub async fn stop(&self, session_id: &str) -> Result<StopOutcome, EncoderError> {
        let found = self
            .handles
            .lock()
            .get(session_id)
            .map(|h| (h.pid, h.generation, h.exited.clone()));

        let Some((pid, generation, mut exited)) = found else {
            tracing::debug!(session_id, "stop requested for idle session");
            return Ok(StopOutcome::AlreadyStopped);
        };

        self.process.terminate(pid).map_err(|source| {
            tracing::error!(session_id, pid, ?source, "encoder termination refused");
            EncoderError::TerminationFailed {
                session_id: session_id.to_string(),
                source,
            }
        })?;

        // The sender only drops after signalling, so an error here means the
        // observer is already gone.
        let _ = exited.wait_for(|done| *done).await;
        remove_if_current(&self.handles, session_id, generation);

        tracing::info!(session_id, pid, "encoder stopped");
        Ok(StopOutcome::Stopped)
    }

    /// Stop every running encode. Used on shutdown.
    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.handles.lock().keys().cloned().collect();
        for session_id in ids {
            if let Err(e) = self.stop(&session_id).await {
                tracing::error!(session_id = %session_id, error = %e, "failed to stop encoder on shutdown");
            }
        }
    }

    pub fn is_encoding(&self, session_id: &str) -> bool {
        self.handles.lock().contains_key(session_id)
    }

    /// Snapshot of running encodes, ordered by session id.
    pub fn active(&self) -> Vec<ActiveEncode> {
        let mut list: Vec<ActiveEncode> = self
            .handles
            .lock()
            .iter()
            .map(|(session_id, h)| ActiveEncode {
                session_id: session_id.clone(),
                pid: h.pid,
                stream_key: h.stream_key.clone(),
                delivery_path: h.delivery_path.clone(),
                started_at: h.started_at,
            })
            .collect();
        list.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        list
    }
}

fn remove_if_current(handles: &HandleMap, session_id: &str, generation: u64) {
    let mut map = handles.lock();
    if map.get(session_id).is_some_and(|h| h.generation == generation) {
        map.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use tokio::process::Command;

    use super::*;
    use crate::encoder::args::test_settings;
    use crate::encoder::process::kill_pid;

    /// Runs `sleep` (or `true` for short-lived runs) in place of the encoder.
    struct FakeProcess {
        program: &'static str,
        args: Vec<&'static str>,
        refuse_kill: AtomicBool,
        spawned: Mutex<Vec<CommandSpec>>,
    }

    impl FakeProcess {
        fn long_lived() -> Arc<Self> {
            Arc::new(Self {
                program: "sleep",
                args: vec!["30"],
                refuse_kill: AtomicBool::new(false),
                spawned: Mutex::new(Vec::new()),
            })
        }

        fn short_lived() -> Arc<Self> {
            Arc::new(Self {
                program: "sh",
                args: vec!["-c", "exit 3"],
                refuse_kill: AtomicBool::new(false),
                spawned: Mutex::new(Vec::new()),
            })
        }
    }

    impl ProcessControl for FakeProcess {
        fn spawn(&self, spec: &CommandSpec) -> io::Result<Child> {
            self.spawned.lock().push(spec.clone());
            Command::new(self.program)
                .args(&self.args)
                .kill_on_drop(true)
                .spawn()
        }

        fn terminate(&self, pid: u32) -> io::Result<()> {
            if self.refuse_kill.load(Ordering::SeqCst) {
                return Err(io::Error::from_raw_os_error(libc::EPERM));
            }
            kill_pid(pid)
        }
    }

    fn manager(process: Arc<FakeProcess>) -> (EncoderManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let manager = EncoderManager::new(test_settings(dir.path()), process);
        (manager, dir)
    }

    async fn wait_until_idle(manager: &EncoderManager, session_id: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.is_encoding(session_id) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("encoder handle was never removed");
    }

    #[tokio::test]
    async fn start_registers_handle_and_creates_output_dir() {
        let process = FakeProcess::long_lived();
        let (manager, dir) = manager(process.clone());

        let started = manager.start("lvs_1").await.unwrap();
        assert_eq!(started.stream_key, "live_lvs_1");
        assert_eq!(started.delivery_path, "live_lvs_1/index.m3u8");
        assert_eq!(started.output_dir, dir.path().join("live_lvs_1"));
        assert!(started.output_dir.is_dir());
        assert!(manager.is_encoding("lvs_1"));

        let spawned = process.spawned.lock();
        assert_eq!(spawned.len(), 1);
        assert!(spawned[0]
            .args
            .last()
            .unwrap()
            .ends_with("live_lvs_1/index.m3u8"));
        drop(spawned);

        manager.stop("lvs_1").await.unwrap();
    }

    #[tokio::test]
    async fn second_start_is_rejected_and_keeps_one_process() {
        let process = FakeProcess::long_lived();
        let (manager, _dir) = manager(process.clone());

        let first = manager.start("lvs_dup").await.unwrap();
        let err = manager.start("lvs_dup").await.unwrap_err();
        assert!(matches!(err, EncoderError::AlreadyEncoding(ref id) if id == "lvs_dup"));

        let active = manager.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].pid, first.pid);
        assert_eq!(process.spawned.lock().len(), 1);

        manager.stop("lvs_dup").await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_starts_admit_exactly_one() {
        let process = FakeProcess::long_lived();
        let (manager, _dir) = manager(process.clone());

        let (a, b) = tokio::join!(manager.start("lvs_race"), manager.start("lvs_race"));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(manager.active().len(), 1);
        assert_eq!(process.spawned.lock().len(), 1);

        manager.stop("lvs_race").await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (manager, _dir) = manager(FakeProcess::long_lived());
        manager.start("lvs_2").await.unwrap();

        assert_eq!(manager.stop("lvs_2").await.unwrap(), StopOutcome::Stopped);
        assert!(!manager.is_encoding("lvs_2"));
        assert_eq!(
            manager.stop("lvs_2").await.unwrap(),
            StopOutcome::AlreadyStopped
        );
    }

    #[tokio::test]
    async fn stop_of_unknown_session_reports_already_stopped() {
        let (manager, _dir) = manager(FakeProcess::long_lived());
        assert_eq!(
            manager.stop("lvs_never").await.unwrap(),
            StopOutcome::AlreadyStopped
        );
    }

    #[tokio::test]
    async fn crashed_encoder_is_removed_by_exit_observer() {
        let (manager, _dir) = manager(FakeProcess::short_lived());
        manager.start("lvs_crash").await.unwrap();

        wait_until_idle(&manager, "lvs_crash").await;
        assert!(manager.active().is_empty());
        assert_eq!(
            manager.stop("lvs_crash").await.unwrap(),
            StopOutcome::AlreadyStopped
        );
    }

    #[tokio::test]
    async fn refused_termination_keeps_handle_for_retry() {
        let process = FakeProcess::long_lived();
        let (manager, _dir) = manager(process.clone());
        let started = manager.start("lvs_stuck").await.unwrap();

        process.refuse_kill.store(true, Ordering::SeqCst);
        let err = manager.stop("lvs_stuck").await.unwrap_err();
        assert!(matches!(err, EncoderError::TerminationFailed { .. }));
        assert!(manager.is_encoding("lvs_stuck"));
        assert_eq!(manager.active()[0].pid, started.pid);

        process.refuse_kill.store(false, Ordering::SeqCst);
        assert_eq!(
            manager.stop("lvs_stuck").await.unwrap(),
            StopOutcome::Stopped
        );
    }

    #[tokio::test]
    async fn restart_after_stop_gets_fresh_handle() {
        let (manager, _dir) = manager(FakeProcess::long_lived());

        let first = manager.start("lvs_again").await.unwrap();
        manager.stop("lvs_again").await.unwrap();
        let second = manager.start("lvs_again").await.unwrap();

        assert_ne!(first.pid, second.pid);
        // Give the first observer a chance to run; it must not touch the new handle.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(manager.is_encoding("lvs_again"));

        manager.stop("lvs_again").await.unwrap();
    }

    #[tokio::test]
    async fn stop_all_clears_every_handle() {
        let (manager, _dir) = manager(FakeProcess::long_lived());
        manager.start("lvs_a").await.unwrap();
        manager.start("lvs_b").await.unwrap();
        assert_eq!(manager.active().len(), 2);

        manager.stop_all().await;
        assert!(manager.active().is_empty());
    }
}
