//! Rebinding of the interpreter's standard streams for a single command.

use crate::sys;
use log::{debug, warn};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;

const NULL_DEVICE: &str = "/dev/null";
const OUTPUT_MODE: u32 = 0o644;

/// Why a command's redirection could not be set up.
#[derive(Debug)]
pub enum RedirectError {
    /// The output target could not be opened for writing.
    Output { path: String, source: io::Error },
    /// The input target could not be opened for reading.
    Input { path: String, source: io::Error },
    /// Duplicating or rebinding a descriptor failed.
    Stream(io::Error),
}

impl fmt::Display for RedirectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectError::Output { path, .. } => write!(f, "{path}: no such file or directory"),
            RedirectError::Input { path, .. } => write!(f, "cannot open {path} for input"),
            RedirectError::Stream(err) => write!(f, "cannot rebind standard streams: {err}"),
        }
    }
}

impl std::error::Error for RedirectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RedirectError::Output { source, .. } | RedirectError::Input { source, .. } => {
                Some(source)
            }
            RedirectError::Stream(err) => Some(err),
        }
    }
}

struct SavedStreams {
    stdin: OwnedFd,
    stdout: OwnedFd,
}

/// The interpreter's standard streams, saved while a command runs with its own.
///
/// Dropping the value (or calling [`Redirection::restore`]) points descriptors
/// 0 and 1 back at the saved streams and closes the saved copies.
pub struct Redirection {
    saved: Option<SavedStreams>,
}

impl Redirection {
    /// Save the current streams, then rebind them to `input` / `output`.
    ///
    /// A `background` command gets the null device on every side it did not
    /// redirect explicitly. On error, whatever was already rebound is restored.
    pub fn apply(
        input: Option<&str>,
        output: Option<&str>,
        background: bool,
    ) -> Result<Self, RedirectError> {
        io::stdout().flush().map_err(RedirectError::Stream)?;

        let saved = SavedStreams {
            stdin: io::stdin()
                .as_fd()
                .try_clone_to_owned()
                .map_err(RedirectError::Stream)?,
            stdout: io::stdout()
                .as_fd()
                .try_clone_to_owned()
                .map_err(RedirectError::Stream)?,
        };
        let redirection = Redirection { saved: Some(saved) };

        let output = output.or(background.then_some(NULL_DEVICE));
        if let Some(path) = output {
            let file = open_output(path).map_err(|source| RedirectError::Output {
                path: path.to_string(),
                source,
            })?;
            sys::dup2(&file, libc::STDOUT_FILENO).map_err(RedirectError::Stream)?;
            debug!("standard output redirected to {path}");
        }

        let input = input.or(background.then_some(NULL_DEVICE));
        if let Some(path) = input {
            let file = File::open(path).map_err(|source| RedirectError::Input {
                path: path.to_string(),
                source,
            })?;
            sys::dup2(&file, libc::STDIN_FILENO).map_err(RedirectError::Stream)?;
            debug!("standard input redirected from {path}");
        }

        Ok(redirection)
    }

    /// Point standard input and output back at the interpreter's own streams.
    ///
    /// Calling this more than once is harmless.
    pub fn restore(&mut self) -> io::Result<()> {
        let Some(saved) = self.saved.take() else {
            return Ok(());
        };
        let flushed = io::stdout().flush();
        sys::dup2(&saved.stdout, libc::STDOUT_FILENO)?;
        sys::dup2(&saved.stdin, libc::STDIN_FILENO)?;
        flushed
    }
}

impl Drop for Redirection {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!("cannot restore standard streams: {err}");
        }
    }
}

fn open_output(path: &str) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(OUTPUT_MODE)
        .open(path)
}
