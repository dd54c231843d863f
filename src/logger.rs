use std::sync::Once;

use chrono::prelude::*;
use log::{LevelFilter, Metadata, Record};

/// Default logger writing to stderr. Hosts that want their own transport
/// install it through `MediaLibrary::set_logger` before `initialize`.
pub struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("medialib")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut target = record.target();
        if target.starts_with("medialib::") {
            target = &target["medialib::".len()..];
        }

        eprintln!(
            "{} [{}] {}: {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            target,
            record.args()
        );
    }

    fn flush(&self) {}
}

static INSTALL: Once = Once::new();

/// Installs `logger` as the process-wide sink. The log facade only accepts
/// one logger per process, so later calls keep the first one.
pub fn install(logger: Option<Box<dyn log::Log>>) {
    INSTALL.call_once(|| {
        let logger = logger.unwrap_or_else(|| Box::new(Logger));
        if log::set_boxed_logger(logger).is_ok() {
            log::set_max_level(LevelFilter::Info);
        }
    });
}

pub fn set_verbosity(level: LevelFilter) {
    log::set_max_level(level);
}
