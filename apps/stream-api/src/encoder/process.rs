//! OS process spawning and forced termination.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, Command};

use super::args::CommandSpec;

/// Abstraction over launching and killing encoder processes.
///
/// Backed by the real OS in production; tests substitute a launcher that runs a
/// harmless long-lived command instead of the encoder.
pub trait ProcessControl: Send + Sync {
    /// Spawn the command. Must be called from within a Tokio runtime.
    fn spawn(&self, spec: &CommandSpec) -> io::Result<Child>;

    /// Forcefully terminate the process with the given OS pid.
    fn terminate(&self, pid: u32) -> io::Result<()>;
}

/// Runs commands as-is and kills with `SIGKILL`.
pub struct SystemProcessControl;

impl ProcessControl for SystemProcessControl {
    fn spawn(&self, spec: &CommandSpec) -> io::Result<Child> {
        Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        kill_pid(pid)
    }
}

/// Send `SIGKILL` to `pid`. A pid that no longer exists is not an error.
pub fn kill_pid(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}
