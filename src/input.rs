//! Line acquisition for the control loop.

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, IsTerminal, Write};

/// One attempt at reading a command line.
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Reading was interrupted (e.g. Ctrl-C); prompt again.
    Interrupted,
    Eof,
}

/// Source of command lines, printing `prompt` first.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Line>;
}

/// Interactive terminal input with line editing and history.
pub struct Editor {
    editor: DefaultEditor,
}

impl Editor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineSource for Editor {
    fn read_line(&mut self, prompt: &str) -> Result<Line> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(Line::Text(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Line::Interrupted),
            Err(ReadlineError::Eof) => Ok(Line::Eof),
            Err(err) => Err(err.into()),
        }
    }
}

/// Plain buffered input, used when standard input is a pipe or a file.
pub struct Piped<R> {
    reader: R,
}

impl<R: BufRead> Piped<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for Piped<R> {
    fn read_line(&mut self, prompt: &str) -> Result<Line> {
        if !prompt.is_empty() {
            let mut stdout = io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(Line::Eof),
            Ok(_) => Ok(Line::Text(line)),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(Line::Interrupted),
            Err(err) => Err(err.into()),
        }
    }
}

/// An editor for terminals, plain buffered reading otherwise.
pub fn open() -> Result<Box<dyn LineSource>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        Ok(Box::new(Editor::new()?))
    } else {
        Ok(Box::new(Piped::new(stdin.lock())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn piped_lines_then_eof() {
        let mut source = Piped::new(Cursor::new("echo hi\nstatus"));
        assert_eq!(source.read_line("").unwrap(), Line::Text("echo hi\n".to_string()));
        assert_eq!(source.read_line("").unwrap(), Line::Text("status".to_string()));
        assert_eq!(source.read_line("").unwrap(), Line::Eof);
    }
}
