use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

static LOGGER: OnceLock<FileLogger> = OnceLock::new();

struct FileLogger {
    file: Option<Mutex<File>>,
    level: LevelFilter,
    echo: bool,
}

impl FileLogger {
    fn format(record: &Record) -> String {
        let ts = Local::now().format("%H:%M:%S%.3f");
        let target = record.target();
        // Module paths are noise for our own crates; keep explicit targets like "stub"
        if target.starts_with("mirrorscout") {
            format!("[{}] [{}] {}", ts, record.level(), record.args())
        } else {
            format!("[{}] [{}] [{}] {}", ts, record.level(), target, record.args())
        }
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format(record);
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                writeln!(f, "{}", line).ok();
            }
        }
        if self.echo || record.level() <= Level::Warn {
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                f.flush().ok();
            }
        }
    }
}

/// Parse a level name such as "info" or "DEBUG". Unknown names fall back to info.
pub fn parse_level(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Initialize the global logger. Truncates `<log_dir>/mirrorscout.log`.
/// Calling it twice keeps the first logger.
pub fn init(log_dir: &Path, level: LevelFilter, echo: bool) {
    fs::create_dir_all(log_dir).ok();
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join("mirrorscout.log"))
        .map_err(|e| eprintln!("failed to open log file in {}: {}", log_dir.display(), e))
        .ok()
        .map(Mutex::new);

    let logger = LOGGER.get_or_init(|| FileLogger { file, level, echo });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" ERROR "), LevelFilter::Error);
        assert_eq!(parse_level("loud"), LevelFilter::Info);
    }
}
