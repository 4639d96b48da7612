//! Hard-kill escalation for a subprocess that ignored its soft abort.
//!
//! On Unix this sends `SIGTERM` first and only escalates to `SIGKILL` after a
//! short grace period, matching the soft-abort-then-kill sequence spec §4.6
//! steps 6/7 describe for the IPC-level abort. Non-Unix targets fall back to
//! `tokio::process::Child::kill`, which is already a hard kill there.

use std::time::Duration;

use tokio::process::Child;
use tracing::warn;

const HARD_KILL_GRACE: Duration = Duration::from_millis(500);

#[cfg(unix)]
pub async fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(raw_pid) = child.id() {
        let pid = Pid::from_raw(raw_pid as i32);
        if let Err(error) = kill(pid, Signal::SIGTERM) {
            warn!(%error, pid = raw_pid, "failed to send sigterm to subprocess");
        }
        tokio::select! {
            _ = child.wait() => return,
            () = tokio::time::sleep(HARD_KILL_GRACE) => {}
        }
        if let Err(error) = kill(pid, Signal::SIGKILL) {
            warn!(%error, pid = raw_pid, "failed to send sigkill to subprocess");
        }
    }
    let _ = child.kill().await;
    let _ = child.wait().await;
}

#[cfg(not(unix))]
pub async fn terminate(child: &mut Child) {
    let _ = child.kill().await;
    let _ = child.wait().await;
}
