use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::paths::pipette_log_dir;

/// Logger for the picker process. Every line goes to stderr, since stdout
/// carries the picked colour; a copy is appended to the log file when one
/// could be opened. Filtering follows `log::max_level`, so the level can be
/// raised or lowered after initialisation.
pub struct AppLogger {
    file: Option<Mutex<File>>,
    app_name: String,
}

impl AppLogger {
    pub fn init(app_name: &str, level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
        let file = Self::open_log_file(&pipette_log_dir(), app_name).ok();

        let logger = AppLogger {
            file: file.map(Mutex::new),
            app_name: app_name.to_string(),
        };

        log::set_max_level(level);
        log::set_logger(Box::leak(Box::new(logger)))
            .map_err(|e| format!("Failed to set logger: {}", e))?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        log::debug!("=== {} started at {} ===", app_name, timestamp);

        Ok(())
    }

    fn open_log_file(dir: &Path, app_name: &str) -> std::io::Result<File> {
        fs::create_dir_all(dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{}.log", app_name)))
    }
}

pub fn level_char(level: Level) -> char {
    match level {
        Level::Error => 'E',
        Level::Warn => 'W',
        Level::Info => 'I',
        Level::Debug => 'D',
        Level::Trace => 'T',
    }
}

/// Parses a level name from configuration; unknown names yield `None`.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

impl log::Log for AppLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = Local::now().format("%H:%M:%S%.3f");
        let log_line = format!("{} {} {}\n", timestamp, record.target(), record.args());

        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = write!(file, "{} {}", level_char(record.level()), log_line);
                let _ = file.flush();
            }
        }

        eprint!("[{}] {} {}", self.app_name, level_char(record.level()), log_line);
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().map(|mut f| f.flush());
        }
    }
}
