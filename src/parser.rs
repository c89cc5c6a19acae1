//! Turns one input line into a [`Command`].
//!
//! The grammar is deliberately tiny:
//!
//! ```text
//! command [arg]... [< infile] [> outfile] [&]
//! ```
//!
//! Tokens are separated by spaces, `<` and `>` must stand alone as tokens,
//! and `&` is only recognized as the very last token.

use crate::command::Command;
use std::fmt;

const OUTPUT_REDIRECT: &str = ">";
const INPUT_REDIRECT: &str = "<";
const BACKGROUND_MARKER: &str = "&";
const PID_MARKER: &str = "$$";

/// Errors that can occur while parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A redirection operator was the last token on the line.
    MissingRedirectTarget(&'static str),
    /// The same redirection operator appeared twice.
    DuplicateRedirect(&'static str),
    /// Nothing was left to run once operators were removed.
    EmptyCommand,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingRedirectTarget(op) => {
                write!(f, "syntax error: expected a file name after '{op}'")
            }
            ParseError::DuplicateRedirect(op) => {
                write!(f, "syntax error: only one '{op}' redirection is supported")
            }
            ParseError::EmptyCommand => write!(f, "syntax error: missing command"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Returns `true` for lines the control loop never hands to the parser:
/// blank lines and comments.
pub fn is_ignorable(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

/// Replace every `$$` in `word` with `pid`.
pub fn substitute_pid(word: &str, pid: &str) -> String {
    word.replace(PID_MARKER, pid)
}

/// Split a trimmed line on single spaces.
///
/// Runs of spaces produce no empty tokens.
fn tokenize(line: &str) -> Vec<&str> {
    line.split(' ').filter(|token| !token.is_empty()).collect()
}

/// Parse `line` into a [`Command`], substituting `pid` for every `$$`.
///
/// The program token is returned unqualified; callers dispatching to an
/// external program apply [`Command::apply_search_prefix`] afterwards.
pub fn parse_line(line: &str, pid: &str) -> Result<Command, ParseError> {
    let tokens = tokenize(line.trim());

    let mut argv = Vec::with_capacity(tokens.len());
    let mut input = None;
    let mut output = None;

    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        let (op, slot) = match token {
            OUTPUT_REDIRECT => (OUTPUT_REDIRECT, &mut output),
            INPUT_REDIRECT => (INPUT_REDIRECT, &mut input),
            word => {
                argv.push(substitute_pid(word, pid));
                continue;
            }
        };

        let target = iter.next().ok_or(ParseError::MissingRedirectTarget(op))?;
        if slot.is_some() {
            return Err(ParseError::DuplicateRedirect(op));
        }
        *slot = Some(substitute_pid(target, pid));
    }

    let background = argv.last().is_some_and(|last| last == BACKGROUND_MARKER);
    if background {
        argv.pop();
    }

    if argv.is_empty() {
        return Err(ParseError::EmptyCommand);
    }

    Ok(Command {
        argv,
        input,
        output,
        background,
    })
}
