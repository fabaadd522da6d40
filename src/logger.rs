//! Logger for the command-line tool.
//!
//! Implements `log::Log` to route library log messages to stderr, with the
//! level chosen at startup.

use std::io::Write;

use log::{LevelFilter, Metadata, Record, SetLoggerError};

static LOGGER: StderrLogger = StderrLogger;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(
                std::io::stderr().lock(),
                "[{:<5}] {}",
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the logger. `verbosity` counts `-v` flags: 0 warn, 1 info, 2 debug, 3+ trace.
pub fn init(verbosity: u8) -> Result<(), SetLoggerError> {
    let max_level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level);
    Ok(())
}
