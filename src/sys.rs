//! Thin wrappers over the libc process primitives the shell is built on.

use std::ffi::CStr;
use std::fmt;
use std::io;
use std::os::fd::{AsRawFd, RawFd};

use libc::{
    WEXITSTATUS, WIFCONTINUED, WIFEXITED, WIFSIGNALED, WIFSTOPPED, WNOHANG, WSTOPSIG, WTERMSIG,
    WUNTRACED, c_int,
};

use crate::command::ShellStatus;

pub type SignalNumber = c_int;

pub fn cerr<Int: Copy + TryInto<libc::c_long>>(res: Int) -> io::Result<Int> {
    match res.try_into() {
        Ok(-1) => Err(io::Error::last_os_error()),
        _ => Ok(res),
    }
}

/// Identifier of a process, as handed out by `fork`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub libc::pid_t);

impl ProcessId {
    pub fn id(&self) -> libc::pid_t {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the running interpreter.
pub fn getpid() -> ProcessId {
    ProcessId(unsafe { libc::getpid() })
}

/// Process group the interpreter belongs to.
pub fn getpgrp() -> ProcessId {
    ProcessId(unsafe { libc::getpgrp() })
}

pub enum ForkResult {
    // Parent process branch with the child process' PID.
    Parent(ProcessId),
    // Child process branch.
    Child,
}

/// Create a new process.
///
/// # Safety
///
/// The caller must be single threaded, or restrict the child branch to
/// async-signal-safe operations until it calls [`execv`] or [`exit_child`].
pub unsafe fn fork() -> io::Result<ForkResult> {
    let pid = cerr(unsafe { libc::fork() })?;
    if pid == 0 {
        Ok(ForkResult::Child)
    } else {
        Ok(ForkResult::Parent(ProcessId(pid)))
    }
}

/// Replace the current program image. Only returns on failure.
///
/// Does not allocate, so it may run in a child forked from a threaded process.
///
/// # Safety
///
/// `argv` must end with a null pointer and every other entry must point to a
/// live, nul-terminated string.
pub unsafe fn execv(path: &CStr, argv: &[*const libc::c_char]) -> io::Error {
    debug_assert!(argv.last().is_some_and(|arg| arg.is_null()));
    unsafe { libc::execv(path.as_ptr(), argv.as_ptr()) };
    io::Error::last_os_error()
}

/// Terminate a forked child without running any of the parent's exit handlers.
pub fn exit_child(code: c_int) -> ! {
    unsafe { libc::_exit(code) }
}

/// Send a signal to a process with the specified ID.
pub fn kill(pid: ProcessId, signal: SignalNumber) -> io::Result<()> {
    // SAFETY: This function cannot cause UB even if `pid` is not a valid process ID or if
    // `signal` is not a valid signal code.
    cerr(unsafe { libc::kill(pid.id(), signal) }).map(|_| ())
}

/// Send a signal to every process in the caller's process group.
pub fn kill_own_group(signal: SignalNumber) -> io::Result<()> {
    cerr(unsafe { libc::kill(0, signal) }).map(|_| ())
}

/// Make `target` refer to the same open file as `source`.
pub fn dup2(source: &impl AsRawFd, target: RawFd) -> io::Result<()> {
    cerr(unsafe { libc::dup2(source.as_raw_fd(), target) }).map(|_| ())
}

/// Write bytes straight to a descriptor; safe to call from a signal handler.
pub fn write_raw(fd: RawFd, bytes: &[u8]) {
    unsafe {
        libc::write(fd, bytes.as_ptr().cast(), bytes.len());
    }
}

/// Options to configure how [`Wait::wait`] waits for children.
pub struct WaitOptions {
    flags: c_int,
}

impl WaitOptions {
    /// Only wait for terminated children.
    pub const fn new() -> Self {
        Self { flags: 0 }
    }

    /// Return immediately if no child has exited.
    pub const fn no_hang(mut self) -> Self {
        self.flags |= WNOHANG;
        self
    }

    /// Also return when a child has stopped.
    pub const fn untraced(mut self) -> Self {
        self.flags |= WUNTRACED;
        self
    }
}

/// Error values returned when [`Wait::wait`] fails.
#[derive(Debug)]
pub enum WaitError {
    // The child has not changed state yet; only with `no_hang`.
    NotReady,
    Io(io::Error),
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::ProcessId {}
}

pub trait Wait: sealed::Sealed {
    /// Wait for a process to change state.
    fn wait(self, options: WaitOptions) -> Result<WaitStatus, WaitError>;
}

impl Wait for ProcessId {
    fn wait(self, options: WaitOptions) -> Result<WaitStatus, WaitError> {
        let mut status: c_int = 0;

        let pid = cerr(unsafe { libc::waitpid(self.id(), &mut status, options.flags) })
            .map_err(WaitError::Io)?;

        if pid == 0 && options.flags & WNOHANG != 0 {
            return Err(WaitError::NotReady);
        }

        Ok(WaitStatus { status })
    }
}

/// The status of the waited child.
#[derive(Clone, Copy)]
pub struct WaitStatus {
    status: c_int,
}

impl fmt::Debug for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.exit_status() {
            write!(f, "ExitStatus({code})")
        } else if let Some(signal) = self.term_signal() {
            write!(f, "TermSignal({signal})")
        } else if let Some(signal) = self.stop_signal() {
            write!(f, "StopSignal({signal})")
        } else if self.did_continue() {
            write!(f, "Continued")
        } else {
            write!(f, "Unknown")
        }
    }
}

impl WaitStatus {
    pub const fn exit_status(&self) -> Option<c_int> {
        if WIFEXITED(self.status) {
            Some(WEXITSTATUS(self.status))
        } else {
            None
        }
    }

    pub const fn term_signal(&self) -> Option<SignalNumber> {
        if WIFSIGNALED(self.status) {
            Some(WTERMSIG(self.status))
        } else {
            None
        }
    }

    pub const fn stop_signal(&self) -> Option<SignalNumber> {
        if WIFSTOPPED(self.status) {
            Some(WSTOPSIG(self.status))
        } else {
            None
        }
    }

    pub const fn did_continue(&self) -> bool {
        WIFCONTINUED(self.status)
    }

    /// The terminal state this status describes, if any.
    ///
    /// Stop and continue notifications are not terminal and yield `None`.
    pub fn terminal(&self) -> Option<ShellStatus> {
        if let Some(code) = self.exit_status() {
            Some(ShellStatus::Exited(code))
        } else {
            self.term_signal().map(ShellStatus::Signaled)
        }
    }
}
