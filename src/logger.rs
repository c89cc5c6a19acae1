//! Diagnostics for the interpreter, written to standard error.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::{self, Write};
use std::sync::Mutex;

const PREFIX: &str = "smallsh: ";

/// Writes each enabled record as one `smallsh: <message>` line.
struct PrefixLogger<W> {
    target: Mutex<W>,
}

impl<W: Write + Send> Log for PrefixLogger<W> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Ok(mut target) = self.target.lock() {
            let _ = writeln!(target, "{PREFIX}{}", record.args());
        }
    }

    fn flush(&self) {
        if let Ok(mut target) = self.target.lock() {
            let _ = target.flush();
        }
    }
}

/// Install the stderr logger for the whole process.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(PrefixLogger {
        target: Mutex::new(io::stderr()),
    }))?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_at<W: Write + Send>(logger: &PrefixLogger<W>, level: log::Level) {
        logger.log(
            &Record::builder()
                .args(format_args!("cannot restore standard streams"))
                .level(level)
                .build(),
        );
    }

    #[test]
    fn test_enabled_records_are_prefixed() {
        log::set_max_level(LevelFilter::Warn);
        let logger = PrefixLogger {
            target: Mutex::new(Vec::new()),
        };

        log_at(&logger, log::Level::Warn);
        log_at(&logger, log::Level::Debug);

        let written = logger.target.into_inner().unwrap();
        assert_eq!(
            String::from_utf8(written).unwrap(),
            "smallsh: cannot restore standard streams\n"
        );
    }
}
