//! Spawners used by the pool tests

use std::io;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::process::{Child, Command};

use super::channel::FragmentSender;
use super::handle::Spawner;
use crate::models::{Identify, OutcomeFragment, Suite};

/// Worker that never reports and runs for `secs`
pub struct SleepSpawner {
    pub secs: u64,
    pub spawned: AtomicUsize,
}

impl SleepSpawner {
    pub fn new(secs: u64) -> Arc<Self> {
        Arc::new(Self {
            secs,
            spawned: AtomicUsize::new(0),
        })
    }
}

impl Spawner for SleepSpawner {
    fn spawn(&self, _suite: &Suite) -> io::Result<Child> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        Command::new("sleep")
            .arg(self.secs.to_string())
            .kill_on_drop(true)
            .spawn()
    }
}

type FragmentFn = dyn Fn(&Suite) -> OutcomeFragment + Send + Sync;

/// Worker shell that prints a precomputed fragment after `delay`
pub struct EchoSpawner {
    sender: FragmentSender,
    delay: &'static str,
    build: Box<FragmentFn>,
    pub spawned: AtomicUsize,
}

impl EchoSpawner {
    /// Every case passes
    pub fn passing(sender: FragmentSender, delay: &'static str) -> Arc<Self> {
        Self::with(sender, delay, all_passed)
    }

    pub fn with<F>(sender: FragmentSender, delay: &'static str, build: F) -> Arc<Self>
    where
        F: Fn(&Suite) -> OutcomeFragment + Send + Sync + 'static,
    {
        Arc::new(Self {
            sender,
            delay,
            build: Box::new(build),
            spawned: AtomicUsize::new(0),
        })
    }
}

impl Spawner for EchoSpawner {
    fn spawn(&self, suite: &Suite) -> io::Result<Child> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        let line = (self.build)(suite).encode()?;

        let mut child = Command::new("sh")
            .args(["-c", "sleep \"$1\"; printf '%s\\n' \"$2\"", "worker"])
            .arg(self.delay)
            .arg(line)
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdout not captured"))?;
        let sender = self.sender.clone();
        let suite = suite.clone();
        tokio::spawn(async move {
            sender
                .relay(stdout, || OutcomeFragment::lost(&suite, "lost"))
                .await;
        });

        Ok(child)
    }
}

pub fn all_passed(suite: &Suite) -> OutcomeFragment {
    OutcomeFragment {
        passed: suite.iter().map(|c| c.fingerprint()).collect(),
        tests_run: suite.len(),
        ..Default::default()
    }
}

/// Pid written to `path` by a shell, once the file is complete
#[cfg(target_os = "linux")]
pub async fn read_pid(path: &std::path::Path) -> u32 {
    for _ in 0..100 {
        if let Ok(text) = std::fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return pid;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    panic!("no pid written to {}", path.display());
}

/// Whether `pid` is gone (or a zombie) before `limit` elapses
#[cfg(target_os = "linux")]
pub async fn exited_within(pid: u32, limit: std::time::Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).unwrap_or_default();
        // State follows the parenthesised command name
        let state = stat.rsplit(')').next().and_then(|rest| rest.trim().chars().next());
        if matches!(state, None | Some('Z') | Some('X')) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
