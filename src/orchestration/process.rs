//! Foreground child processes
//!
//! Delegated commands run with the terminal's stdio. Their exit code is
//! handed back untouched; Ctrl-C stops the child and reports 130.
//!
//! On a terminal the child shares our process group, so the kernel already
//! delivers Ctrl-C to everything it started. Otherwise the child gets a
//! group of its own and the interrupt is forwarded to that whole group.
//! Either way the engine client sees SIGINT first, letting its sig-proxy
//! stop the container; SIGKILL follows only after a grace period.

use crate::error::{CrossenvError, CrossenvResult};
use std::future::Future;
use std::io::IsTerminal;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code reported when the user interrupts a delegated command
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How long an interrupted child may take to exit before it is killed
const INTERRUPT_GRACE: Duration = Duration::from_secs(10);

/// Run `cmd` with inherited stdio and return its exit code.
pub(crate) async fn run_inherited(cmd: Command, label: &str) -> CrossenvResult<i32> {
    let own_group = !std::io::stdin().is_terminal();
    run_foreground(cmd, label, interrupted(), own_group, INTERRUPT_GRACE).await
}

/// Run `cmd` until it exits or `interrupt` resolves.
async fn run_foreground(
    mut cmd: Command,
    label: &str,
    interrupt: impl Future<Output = ()>,
    own_group: bool,
    grace: Duration,
) -> CrossenvResult<i32> {
    debug!("Executing interactively: {}", label);

    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    #[cfg(unix)]
    if own_group {
        cmd.process_group(0);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| CrossenvError::command_failed(label, e))?;
    let target = child.id().map(|pid| SignalTarget { pid, own_group });

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| CrossenvError::command_failed(label, e))?;
            Ok(exit_code(status))
        }
        _ = interrupt => {
            warn!("Interrupted, stopping {}", label);
            if let Some(ref target) = target {
                target.send(Signal::Interrupt);
            }

            if tokio::time::timeout(grace, child.wait()).await.is_err() {
                warn!("{} still running after {:?}, killing it", label, grace);
                if let Some(ref target) = target {
                    target.send(Signal::Kill);
                }
                let _ = child.start_kill();
                let _ = child.wait().await;
            }

            // Sweep anything the child left behind in its group
            if let Some(ref target) = target {
                if target.own_group {
                    target.send(Signal::Kill);
                }
            }

            Ok(INTERRUPTED_EXIT_CODE)
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Interrupt,
    Kill,
}

/// The child, or its whole process group when it leads one
struct SignalTarget {
    pid: u32,
    own_group: bool,
}

impl SignalTarget {
    #[cfg(unix)]
    fn send(&self, signal: Signal) {
        let Ok(pid) = libc::pid_t::try_from(self.pid) else {
            return;
        };
        let pid = if self.own_group { -pid } else { pid };
        let signal = match signal {
            Signal::Interrupt => libc::SIGINT,
            Signal::Kill => libc::SIGKILL,
        };

        // SAFETY: kill(2) takes plain integers and touches no memory
        if unsafe { libc::kill(pid, signal) } == -1 {
            debug!(
                "Signal {} to {} not delivered: {}",
                signal,
                pid,
                std::io::Error::last_os_error()
            );
        }
    }

    #[cfg(not(unix))]
    fn send(&self, _signal: Signal) {}
}

/// Map an exit status to a shell-style exit code
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
