//! Worker process handles and spawning
//!
//! A [`WorkerHandle`] wraps one live OS process. Its monitor task owns the
//! child, records how it ended and gives the pool slot back on exit.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch, OwnedSemaphorePermit};
use tracing::{debug, warn};

use super::channel::FragmentSender;
use crate::models::{OutcomeFragment, Suite};

/// Lifecycle of a worker process
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Spawned,
    Running,
    /// Exited on its own, with its exit code if it had one
    Finished(Option<i32>),
    /// Killed by the pool
    Terminated,
}

impl WorkerState {
    pub fn is_alive(&self) -> bool {
        matches!(self, WorkerState::Spawned | WorkerState::Running)
    }
}

/// Starts worker processes; injected into the scheduler
pub trait Spawner: Send + Sync {
    /// Start a worker process executing `suite`
    fn spawn(&self, suite: &Suite) -> io::Result<Child>;
}

/// Handle to one worker process
#[derive(Debug)]
pub struct WorkerHandle {
    id: usize,
    suite: String,
    pid: Option<u32>,
    state: watch::Receiver<WorkerState>,
    kill: Option<oneshot::Sender<()>>,
}

impl WorkerHandle {
    /// Take ownership of `child` and hold `permit` until it exits
    pub fn watch(id: usize, suite: &str, mut child: Child, permit: OwnedSemaphorePermit) -> Self {
        let pid = child.id();
        let (state_tx, state_rx) = watch::channel(WorkerState::Spawned);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let label = suite.to_string();

        tokio::spawn(async move {
            let _permit = permit;
            state_tx.send_replace(WorkerState::Running);

            let end = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => WorkerState::Finished(status.code()),
                    Err(e) => {
                        warn!("Failed to wait on worker {} ({}): {}", id, label, e);
                        WorkerState::Finished(None)
                    }
                },
                Ok(()) = kill_rx => {
                    if let Err(e) = kill_tree(&mut child, pid).await {
                        warn!("Failed to kill worker {} ({}): {}", id, label, e);
                    }
                    WorkerState::Terminated
                }
            };

            debug!("Worker {} ({}) ended: {:?}", id, label, end);
            state_tx.send_replace(end);
        });

        Self {
            id,
            suite: suite.to_string(),
            pid,
            state: state_rx,
            kill: Some(kill_tx),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    /// Ask the monitor to kill the process; no-op once it has exited
    pub fn terminate(&mut self) {
        if let Some(kill) = self.kill.take() {
            // Err means the monitor already finished
            let _ = kill.send(());
        }
    }

    /// Wait until the process has exited and been reaped
    pub async fn join(&mut self) -> WorkerState {
        if self.state.wait_for(|state| !state.is_alive()).await.is_err() {
            debug!("Monitor for worker {} went away before reporting", self.id);
        }
        self.state()
    }
}

/// Kill the worker together with every command it started, then reap it.
/// Falls back to the worker alone when it does not lead a process group.
async fn kill_tree(child: &mut Child, pid: Option<u32>) -> io::Result<()> {
    if pid.is_some_and(kill_group) {
        child.wait().await.map(|_| ())
    } else {
        child.kill().await
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) -> bool {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) => true,
        Err(e) => {
            debug!("No process group {} to kill: {}", pgid, e);
            false
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) -> bool {
    false
}

/// Spawns `<program> worker` processes that read a suite on stdin and report
/// one fragment on stdout
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<String>,
    sender: FragmentSender,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<PathBuf>, sender: FragmentSender) -> Self {
        Self {
            program: program.into(),
            args: vec!["worker".to_string()],
            sender,
        }
    }

    /// Re-execute the running binary as the worker
    pub fn current_exe(sender: FragmentSender) -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, sender))
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl Spawner for ProcessSpawner {
    fn spawn(&self, suite: &Suite) -> io::Result<Child> {
        let payload = serde_json::to_vec(suite)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        // Case commands inherit the group, so terminate can reach them
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "worker stdout not captured"))?;

        if let Some(mut stdin) = child.stdin.take() {
            let name = suite.name.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    warn!("Failed to hand suite '{}' to its worker: {}", name, e);
                }
            });
        }

        let sender = self.sender.clone();
        let suite = suite.clone();
        tokio::spawn(async move {
            sender
                .relay(stdout, || {
                    OutcomeFragment::lost(&suite, "worker exited without reporting results")
                })
                .await;
        });

        Ok(child)
    }
}
