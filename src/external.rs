use crate::command::ShellStatus;
use crate::env::Environment;
use crate::jobs::JobRegistry;
use crate::redirect::Redirection;
use crate::signals;
use crate::sys::{self, ForkResult, ProcessId, Wait, WaitError, WaitOptions};
use log::debug;
use std::borrow::Cow;
use std::ffi::{CString, NulError, OsStr};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Command that is not a builtin: a program image plus its argument vector.
pub struct ExternalCommand {
    path: CString,
    args: Vec<CString>,
    // Null-terminated pointers into `args`, ready for execv(2).
    argv: Vec<*const libc::c_char>,
}

impl ExternalCommand {
    /// `args` excludes the program; the child sees `path` as its `argv[0]`.
    pub fn new(path: &Path, args: &[String]) -> Result<Self, NulError> {
        let path = CString::new(path.as_os_str().as_bytes())?;
        let mut owned = Vec::with_capacity(args.len() + 1);
        owned.push(path.clone());
        for arg in args {
            owned.push(CString::new(arg.as_str())?);
        }
        let mut argv: Vec<_> = owned.iter().map(|arg| arg.as_ptr()).collect();
        argv.push(std::ptr::null());
        Ok(Self {
            path,
            args: owned,
            argv,
        })
    }

    pub fn path(&self) -> Cow<'_, str> {
        self.path.to_string_lossy()
    }

    /// Fork a child that replaces itself with this program.
    ///
    /// The child inherits the current descriptors 0 and 1, so any
    /// [`Redirection`] must already be in place.
    ///
    /// Between `fork` and `exec` the child neither allocates nor takes locks:
    /// the argument vector is built up front and failures are reported with
    /// raw `write(2)`. That keeps it sound when other threads exist, as they
    /// do under the test harness.
    pub(crate) fn spawn(&self) -> io::Result<ProcessId> {
        io::stdout().flush()?;
        // SAFETY: the child branch only calls async-signal-safe functions
        // (sigaction, execv, write, _exit) before it execs or exits.
        match unsafe { sys::fork() }? {
            ForkResult::Parent(pid) => Ok(pid),
            ForkResult::Child => self.exec_child(),
        }
    }

    fn exec_child(&self) -> ! {
        if signals::prepare_child().is_err() {
            child_error(&[b"cannot reset signal dispositions".as_slice()]);
            sys::exit_child(1);
        }
        // SAFETY: `argv` was built in `new` from the CStrings in `args`, which
        // live as long as `self`, and ends with a null pointer.
        let err = unsafe { sys::execv(&self.path, &self.argv) };
        let reason: &[u8] = match err.raw_os_error() {
            Some(libc::ENOENT) => b"no such file or directory",
            Some(libc::EACCES) => b"permission denied",
            _ => b"cannot execute",
        };
        child_error(&[self.path.as_bytes(), b": ", reason]);
        sys::exit_child(1)
    }
}

/// Write `smallsh: <parts>\n` to standard error without allocating.
fn child_error(parts: &[&[u8]]) {
    sys::write_raw(libc::STDERR_FILENO, b"smallsh: ");
    for part in parts {
        sys::write_raw(libc::STDERR_FILENO, part);
    }
    sys::write_raw(libc::STDERR_FILENO, b"\n");
}

/// Block until `pid` exits or is killed. Stops and continues keep waiting.
pub fn wait_foreground(pid: ProcessId) -> io::Result<ShellStatus> {
    loop {
        match pid.wait(WaitOptions::new().untraced()) {
            Ok(status) => match status.terminal() {
                Some(terminal) => return Ok(terminal),
                None => debug!("foreground pid {pid} changed state: {status:?}"),
            },
            Err(WaitError::Io(err)) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(WaitError::Io(err)) => return Err(err),
            Err(WaitError::NotReady) => {}
        }
    }
}

/// Run `program` to completion, then give the interpreter its streams back.
pub fn run_foreground(
    program: &ExternalCommand,
    mut redirection: Redirection,
) -> io::Result<ShellStatus> {
    let pid = program.spawn()?;
    debug!("foreground pid {pid} running {}", program.path());
    let status = wait_foreground(pid);
    redirection.restore()?;
    status
}

/// Start `program` without waiting, track it in `jobs` and announce it on `out`.
pub fn run_background(
    program: &ExternalCommand,
    mut redirection: Redirection,
    jobs: &mut JobRegistry,
    out: &mut dyn Write,
) -> io::Result<ProcessId> {
    let pid = program.spawn()?;
    jobs.push(pid);
    redirection.restore()?;
    debug!("background pid {pid} running {}", program.path());
    writeln!(out, "background pid is {pid}")?;
    out.flush()?;
    Ok(pid)
}

/// Pick the file to exec for a program typed as `typed`, already qualified as `qualified`.
///
/// The qualified path wins when it exists. Otherwise `typed` is looked up the
/// usual way on the whole `PATH`. If that fails too, the qualified path is
/// returned so that the child reports the failure.
pub fn resolve_executable(typed: &str, qualified: &str, env: &Environment) -> PathBuf {
    let qualified = Path::new(qualified);
    if qualified.exists() {
        return qualified.to_path_buf();
    }
    env.get_var("PATH")
        .and_then(|paths| {
            find_command_path(OsStr::new(&paths), Path::new(typed)).map(Cow::into_owned)
        })
        .unwrap_or_else(|| qualified.to_path_buf())
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/sh`): returns it if it exists.
/// - `./foo`: returns it if it exists.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing match.
/// - Empty path: returns `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    if path.starts_with("./") && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| path.exists())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}
