// src/workload/reaper.rs
// Background task that waits on the workload process and publishes its exit

use super::WorkloadState;
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Exit code reported when the process was killed by a signal or could not be waited on
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Move `state` forward to `next`, never leaving `Exited`
pub(crate) fn advance(state: &watch::Sender<WorkloadState>, next: WorkloadState) -> bool {
    state.send_if_modified(|current| {
        if current.is_exited() || *current == next {
            return false;
        }
        *current = next;
        true
    })
}

/// Spawn the reaper for `child`.
///
/// Publishes `Exited(code)` exactly once, whether the process stopped on its
/// own, was stopped externally, or was killed after `kill_rx` fired.
pub(crate) fn spawn(
    mut child: Child,
    identity: String,
    state: Arc<watch::Sender<WorkloadState>>,
    kill_rx: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            Ok(()) = kill_rx => {
                debug!(identity = %identity, "Killing workload process");
                if let Err(e) = child.start_kill() {
                    warn!(identity = %identity, error = %e, "Failed to kill workload process");
                }
                child.wait().await
            }
        };

        let code = match status {
            Ok(status) => exit_code(&status),
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to wait on workload process");
                UNKNOWN_EXIT_CODE
            }
        };

        info!(identity = %identity, exit_code = code, "Workload process exited");
        advance(&state, WorkloadState::Exited(code));
    })
}

fn exit_code(status: &ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            debug!(signal, "Workload process terminated by signal");
        }
    }
    status.code().unwrap_or(UNKNOWN_EXIT_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_moves_forward() {
        let (tx, rx) = watch::channel(WorkloadState::Starting);
        assert!(advance(&tx, WorkloadState::Running));
        assert!(advance(&tx, WorkloadState::Ready));
        assert_eq!(*rx.borrow(), WorkloadState::Ready);
    }

    #[test]
    fn test_advance_ignores_repeat() {
        let (tx, _rx) = watch::channel(WorkloadState::Running);
        assert!(!advance(&tx, WorkloadState::Running));
    }

    #[test]
    fn test_exited_is_terminal() {
        let (tx, rx) = watch::channel(WorkloadState::Running);
        assert!(advance(&tx, WorkloadState::Exited(2)));
        assert!(!advance(&tx, WorkloadState::Ready));
        assert!(!advance(&tx, WorkloadState::Exited(0)));
        assert_eq!(*rx.borrow(), WorkloadState::Exited(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reaper_reports_exit_code() {
        let child = tokio::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .spawn()
            .unwrap();
        let (tx, mut rx) = watch::channel(WorkloadState::Running);
        let (_kill_tx, kill_rx) = oneshot::channel();

        let handle = spawn(child, "test".to_string(), Arc::new(tx), kill_rx);
        handle.await.unwrap();

        let state = *rx.wait_for(|s| s.is_exited()).await.unwrap();
        assert_eq!(state, WorkloadState::Exited(7));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reaper_kills_on_request() {
        let child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let (tx, rx) = watch::channel(WorkloadState::Running);
        let (kill_tx, kill_rx) = oneshot::channel();

        let handle = spawn(child, "test".to_string(), Arc::new(tx), kill_rx);
        kill_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(*rx.borrow(), WorkloadState::Exited(UNKNOWN_EXIT_CODE));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_kill_sender_does_not_kill() {
        let child = tokio::process::Command::new("sh")
            .args(["-c", "sleep 0.2; exit 4"])
            .spawn()
            .unwrap();
        let (tx, rx) = watch::channel(WorkloadState::Running);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        drop(kill_tx);

        spawn(child, "test".to_string(), Arc::new(tx), kill_rx)
            .await
            .unwrap();

        assert_eq!(*rx.borrow(), WorkloadState::Exited(4));
    }
}
