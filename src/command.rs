use crate::interpreter::Session;
use anyhow::Result;
use std::fmt;
use std::io::Write;

/// How the last foreground command terminated.
///
/// This is the value reported by the `status` built-in and by background
/// completion messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellStatus {
    /// The program exited normally with this code.
    Exited(i32),
    /// The program was killed by this signal number.
    Signaled(i32),
}

impl Default for ShellStatus {
    fn default() -> Self {
        ShellStatus::Exited(0)
    }
}

impl fmt::Display for ShellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellStatus::Exited(code) => write!(f, "exit value {code}"),
            ShellStatus::Signaled(signal) => write!(f, "terminated by signal {signal}"),
        }
    }
}

/// A single parsed command line, ready to be dispatched.
///
/// Redirection operators and the trailing `&` never appear in `argv`;
/// the parser strips them and records them in the other fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// Program first, then its arguments.
    pub argv: Vec<String>,
    /// File to read standard input from.
    pub input: Option<String>,
    /// File to write standard output to.
    pub output: Option<String>,
    /// Whether the line ended with `&`.
    pub background: bool,
}

impl Command {
    /// The program token as typed.
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments following the program token.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// Prefix the program token with `prefix` unless it already contains it.
    pub fn apply_search_prefix(&mut self, prefix: &str) {
        if let Some(program) = self.argv.first_mut() {
            if !program.contains(prefix) {
                program.insert_str(0, prefix);
            }
        }
    }
}

/// Object-safe trait for anything the interpreter can run in-process.
pub trait ExecutableCommand {
    /// Executes the command, writing user-facing output to `stdout`.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<()>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
