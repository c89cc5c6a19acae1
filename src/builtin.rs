use crate::command::{CommandFactory, ExecutableCommand};
use crate::interpreter::{Factory, Session};
use crate::jobs;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use log::debug;
use std::env;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. They never see redirections.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "status".
    fn name() -> &'static str;

    /// Executes the command, writing any user-facing output to `stdout`.
    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        if let Err(e) = <T as BuiltinCommand>::execute(*self, stdout, session) {
            writeln!(stdout, "{}: {e}", T::name())?;
        }
        stdout.flush()?;
        Ok(())
    }
}

struct InvalidArgs {
    output: String,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        writeln!(stdout, "{}", self.output.trim_end())?;
        stdout.flush()?;
        Ok(())
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, .. }) => Box::new(InvalidArgs { output }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        let target = match self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match session.env.home() {
                Some(home) => home,
                None => anyhow::bail!("HOME not set"),
            },
        };

        if let Err(err) = env::set_current_dir(&target) {
            debug!("chdir to {} failed: {err}", target.display());
            writeln!(stdout, "cd: no such file or directory: {}", target.display())?;
            return Ok(());
        }

        debug!("working directory is now {}", target.display());
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print how the last foreground command terminated.
pub struct Status {}

impl BuiltinCommand for Status {
    fn name() -> &'static str {
        "status"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        writeln!(stdout, "{}", session.status)?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Kill every background job and exit the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        debug!("exit: killing {} background job(s)", session.jobs.len());
        jobs::kill_all(&mut session.jobs);
        session.env.should_exit = true;
        Ok(())
    }
}
