use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};

use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

use crate::config::Settings;

static TRACING_INIT: OnceLock<PathBuf> = OnceLock::new();

/// Where log lines go. The terminal belongs to the UI, so never stdout.
pub fn log_path(settings: &Settings) -> PathBuf {
    settings
        .log_path
        .as_deref()
        .and_then(|p| shellexpand::full(p).ok())
        .map(|p| PathBuf::from(p.as_ref()))
        .unwrap_or_else(|| env::temp_dir().join("lexipen.jsonl"))
}

/// Installs the global JSON subscriber once. Returns the log file path, or
/// `None` when the file could not be opened (logging is then off).
pub fn init_tracing(settings: &Settings) -> Option<PathBuf> {
    if let Some(path) = TRACING_INIT.get() {
        return Some(path.clone());
    }
    let path = log_path(settings);
    let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;
    let level = Level::from_str(&settings.log_level).unwrap_or(Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(Mutex::new(file))
        .with_max_level(level)
        .with_current_span(false)
        .with_span_list(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    Some(TRACING_INIT.get_or_init(|| path).clone())
}
