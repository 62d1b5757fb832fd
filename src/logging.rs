//! A stderr logger for the `log` facade, and helpers for logging recoverable errors.

use log::{Level, Log, Metadata, Record, SetLoggerError};

/// Evaluates a `Result`, logging the error at `warn` level and discarding it.
#[macro_export]
macro_rules! with_warn {
    ($expr: expr) => (with_warn!("{}", $expr));
    ($fmt: tt, $expr: expr) => (match $expr {
        Ok(_) => (),
        Err(e) => warn!($fmt, e),
    });
}

/// Writes `[target] [level] message` lines to stderr.
pub struct SimpleLogger {
    level: Level,
}

impl SimpleLogger {
    /// Installs the logger for messages at `level` and above.
    pub fn init(level: Level) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(SimpleLogger { level }))?;
        log::set_max_level(level.to_level_filter());
        Ok(())
    }
}

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] [{}] {}", record.target(), record.level(), record.args());
        }
    }

    fn flush(&self) {}
}
