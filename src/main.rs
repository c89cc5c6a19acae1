use anyhow::{Context, Result};
use argh::FromArgs;
use log::{LevelFilter, debug};
use smallsh::{Interpreter, PROMPT, input, logger, signals};
use std::process::ExitCode;

#[derive(FromArgs)]
/// A small interactive shell.
struct Args {
    /// log interpreter decisions to standard error
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// diagnostic level: off, error, warn, info, debug or trace
    #[argh(option)]
    log_level: Option<LevelFilter>,

    /// do not print a prompt before each line
    #[argh(switch)]
    no_prompt: bool,
}

impl Args {
    fn level(&self) -> LevelFilter {
        match (self.log_level, self.verbose) {
            (Some(level), _) => level,
            (None, true) => LevelFilter::Debug,
            (None, false) => LevelFilter::Warn,
        }
    }
}

fn run(args: Args) -> Result<()> {
    logger::init(args.level()).context("cannot install logger")?;
    let _handlers = signals::install().context("cannot install signal handlers")?;

    let mut lines = input::open()?;
    let mut interpreter = Interpreter::default();
    let prompt = if args.no_prompt { "" } else { PROMPT };

    let result = interpreter.repl(lines.as_mut(), prompt);
    debug!("leaving, status {}", interpreter.session().status);
    interpreter.terminate_process_group();
    result
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("smallsh: {err:#}");
            ExitCode::FAILURE
        }
    }
}
