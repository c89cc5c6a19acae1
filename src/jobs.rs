//! Tracking of background processes until they are reaped.

use crate::command::ShellStatus;
use crate::sys::{self, ProcessId, Wait, WaitError, WaitOptions};
use log::{debug, warn};
use std::io::{self, Write};

const INITIAL_CAPACITY: usize = 4;

/// Result of polling a tracked process without blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Still running (or merely stopped).
    Running,
    /// Reached a terminal state.
    Done(ShellStatus),
    /// No longer a child of the interpreter; nothing to report.
    Gone,
}

/// Ordered set of background process identifiers.
///
/// Entries are kept in launch order and removal never reorders the rest.
#[derive(Debug)]
pub struct JobRegistry {
    pids: Vec<ProcessId>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            pids: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Start tracking `pid`. Returns `false` if it was already tracked.
    pub fn push(&mut self, pid: ProcessId) -> bool {
        if self.contains(pid) {
            return false;
        }
        if self.pids.len() == self.pids.capacity() {
            self.pids.reserve_exact(self.pids.capacity().max(INITIAL_CAPACITY));
        }
        self.pids.push(pid);
        true
    }

    fn contains(&self, pid: ProcessId) -> bool {
        self.pids.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.pids.iter().copied()
    }

    /// Forget every tracked process and release the storage.
    pub fn clear(&mut self) {
        self.pids = Vec::new();
    }

    /// Poll every tracked process with `poll` and drop the finished ones.
    ///
    /// Returns the finished processes with their status, in registry order.
    pub fn reap_with<F>(&mut self, mut poll: F) -> Vec<(ProcessId, ShellStatus)>
    where
        F: FnMut(ProcessId) -> Poll,
    {
        let mut finished = Vec::new();
        self.pids.retain(|&pid| match poll(pid) {
            Poll::Running => true,
            Poll::Done(status) => {
                finished.push((pid, status));
                false
            }
            Poll::Gone => {
                warn!("background pid {pid} vanished before it could be reaped");
                false
            }
        });
        finished
    }

    /// Reap finished background processes and report each one to `out`.
    ///
    /// Never blocks.
    pub fn reap(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        for (pid, status) in self.reap_with(poll_process) {
            debug!("reaped background pid {pid}: {status:?}");
            writeln!(out, "background pid {pid} is done: {status}")?;
        }
        out.flush()
    }
}

/// Non-blocking status poll of a real child process.
pub fn poll_process(pid: ProcessId) -> Poll {
    loop {
        match pid.wait(WaitOptions::new().no_hang()) {
            Ok(status) => return status.terminal().map_or(Poll::Running, Poll::Done),
            Err(WaitError::NotReady) => return Poll::Running,
            Err(WaitError::Io(err)) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(WaitError::Io(err)) => {
                debug!("polling background pid {pid} failed: {err}");
                return Poll::Gone;
            }
        }
    }
}

/// Forcefully terminate every tracked process, then forget them all.
pub fn kill_all(jobs: &mut JobRegistry) {
    for pid in jobs.iter() {
        if let Err(err) = sys::kill(pid, libc::SIGKILL) {
            warn!("cannot kill background pid {pid}: {err}");
        }
        // Collect the zombie; a failure only means it is already gone.
        let _ = pid.wait(WaitOptions::new());
    }
    jobs.clear();
}
