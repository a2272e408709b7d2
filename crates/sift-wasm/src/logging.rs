//! `log` backend that writes to the browser console.

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::prelude::*;
use web_sys::console;

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[jobsift] {}", record.args()));
        match record.level() {
            Level::Error => console::error_1(&line),
            Level::Warn => console::warn_1(&line),
            Level::Info => console::info_1(&line),
            Level::Debug | Level::Trace => console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

fn parse_level(level: Option<&str>) -> LevelFilter {
    level
        .and_then(|l| l.parse().ok())
        .unwrap_or(LevelFilter::Warn)
}

/// Install the console logger. `level` is a `log` level name ("debug",
/// "warn", ...); defaults to warn. Calling it again only changes the level.
#[wasm_bindgen]
pub fn init_logging(level: Option<String>) {
    // already installed on repeat calls
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(parse_level(level.as_deref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("WARN")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("chatty")), LevelFilter::Warn);
        assert_eq!(parse_level(None), LevelFilter::Warn);
    }
}
