//! A small interactive shell with job control basics.
//!
//! Lines are read from a terminal (with line editing) or from a pipe, parsed
//! into a [`command::Command`] and either handled in-process by one of the
//! built-ins `exit`, `cd` and `status`, or run as an external program in the
//! foreground or background.
//!
//! The main entry point is [`Interpreter`]. `SIGTSTP` toggles a
//! foreground-only mode in which a trailing `&` is ignored; see [`signals`].

mod builtin;
pub mod command;
pub mod env;
pub mod external;
pub mod input;
mod interpreter;
pub mod jobs;
pub mod logger;
pub mod parser;
pub mod redirect;
pub mod signals;
pub mod sys;

pub use interpreter::{Interpreter, PROMPT, Session};
