use crate::command::{Command, CommandFactory, ExecutableCommand, ShellStatus};
use crate::env::Environment;
use crate::external::{self, ExternalCommand};
use crate::input::{Line, LineSource};
use crate::jobs::{self, JobRegistry};
use crate::parser;
use crate::redirect::Redirection;
use crate::signals::{self, ModeGate};
use crate::sys;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::io::{self, Write};

/// The prompt printed before every line.
pub const PROMPT: &str = ": ";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only support commands defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// State that outlives a single command line.
pub struct Session {
    pub env: Environment,
    pub jobs: JobRegistry,
    /// How the last foreground command terminated.
    pub status: ShellStatus,
}

impl Session {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            jobs: JobRegistry::new(),
            status: ShellStatus::default(),
        }
    }
}

/// The shell's control loop: prompts, reaps, parses and dispatches.
///
/// Example
/// ```
/// use smallsh::Interpreter;
/// let mut sh = Interpreter::default();
/// let mut out = Vec::new();
/// sh.run_line("status", &mut out).unwrap();
/// assert_eq!(out, b"exit value 0\n");
/// ```
pub struct Interpreter {
    session: Session,
    builtins: Vec<Box<dyn CommandFactory>>,
    gate: ModeGate,
    pid: String,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of built-in factories.
    pub fn new(builtins: Vec<Box<dyn CommandFactory>>, gate: ModeGate) -> Self {
        Self {
            session: Session::new(Environment::new()),
            builtins,
            gate,
            pid: sys::getpid().to_string(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn should_exit(&self) -> bool {
        self.session.env.should_exit
    }

    /// Execute one raw input line.
    ///
    /// Only conditions that must end the interpreter (a failed `fork`, or the
    /// interpreter losing its own streams) are returned as errors; everything
    /// else is reported on `out` and recorded in the session.
    pub fn run_line(&mut self, line: &str, out: &mut dyn Write) -> Result<()> {
        if parser::is_ignorable(line) {
            return Ok(());
        }

        let command = match parser::parse_line(line, &self.pid) {
            Ok(command) => command,
            Err(err) => {
                writeln!(out, "smallsh: {err}")?;
                out.flush()?;
                return Ok(());
            }
        };

        match self.find_builtin(&command) {
            Some(builtin) => {
                debug!("running builtin {}", command.program());
                builtin.execute(out, &mut self.session)
            }
            None => self.run_external(command, out),
        }
    }

    fn find_builtin(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>> {
        let args: Vec<&str> = command.args().iter().map(String::as_str).collect();
        self.builtins
            .iter()
            .find_map(|factory| factory.try_create(command.program(), &args))
    }

    fn run_external(&mut self, mut command: Command, out: &mut dyn Write) -> Result<()> {
        self.session.jobs.reap(out)?;

        let background = command.background && self.gate.policy().allows_background();
        if command.background && !background {
            debug!("foreground-only mode: running {} in the foreground", command.program());
        }

        let typed = command.program().to_string();
        if let Some(prefix) = self.session.env.search_path_prefix() {
            command.apply_search_prefix(&prefix);
        }
        let path = external::resolve_executable(&typed, command.program(), &self.session.env);

        let program = match ExternalCommand::new(&path, command.args()) {
            Ok(program) => program,
            Err(err) => {
                writeln!(out, "smallsh: {typed}: {err}")?;
                out.flush()?;
                self.session.status = ShellStatus::Exited(1);
                return Ok(());
            }
        };

        let redirection = match Redirection::apply(
            command.input.as_deref(),
            command.output.as_deref(),
            background,
        ) {
            Ok(redirection) => redirection,
            Err(err) => {
                debug!("redirection failed: {err:?}");
                writeln!(out, "{err}")?;
                out.flush()?;
                self.session.status = ShellStatus::Exited(1);
                return Ok(());
            }
        };

        if background {
            external::run_background(&program, redirection, &mut self.session.jobs, out)
                .with_context(|| format!("cannot start {}", program.path()))?;
        } else {
            let status = external::run_foreground(&program, redirection)
                .with_context(|| format!("cannot run {}", program.path()))?;
            if let ShellStatus::Signaled(_) = status {
                writeln!(out, "{status}")?;
                out.flush()?;
            }
            self.session.status = status;
        }
        Ok(())
    }

    /// Work done before every prompt: reap finished jobs and notice mode switches.
    fn before_prompt(&mut self, out: &mut dyn Write) -> Result<()> {
        self.session.jobs.reap(out)?;
        if let Some(policy) = self.gate.poll_switch() {
            debug!("background policy is now {policy:?}");
        }
        Ok(())
    }

    /// Read-eval loop. Returns once `exit` ran or the input is exhausted.
    pub fn repl(&mut self, lines: &mut dyn LineSource, prompt: &str) -> Result<()> {
        let mut stdout = io::stdout();
        while !self.should_exit() {
            self.before_prompt(&mut stdout)?;
            match lines.read_line(prompt)? {
                Line::Text(line) => self.run_line(&line, &mut stdout)?,
                Line::Interrupted => continue,
                Line::Eof => {
                    debug!("end of input");
                    jobs::kill_all(&mut self.session.jobs);
                    self.session.env.should_exit = true;
                }
            }
        }
        Ok(())
    }

    /// Take the rest of the process group down with the interpreter.
    ///
    /// Only done when the interpreter leads its own group, so the caller's
    /// group is never signalled.
    pub fn terminate_process_group(&mut self) {
        jobs::kill_all(&mut self.session.jobs);
        if sys::getpgrp() != sys::getpid() {
            debug!("not a process group leader, leaving the group alone");
            return;
        }
        if let Err(err) = signals::ignore(libc::SIGTERM) {
            warn!("cannot ignore SIGTERM: {err}");
            return;
        }
        if let Err(err) = sys::kill_own_group(libc::SIGTERM) {
            warn!("cannot signal process group: {err}");
        }
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the built-ins `exit`, `cd` and `status`,
    /// reading the process-wide foreground-only flag.
    fn default() -> Self {
        use crate::builtin::*;
        Self::new(
            vec![
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Status>::default()),
            ],
            ModeGate::process(),
        )
    }
}
