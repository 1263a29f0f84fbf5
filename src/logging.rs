use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "PLAYDECK_LOG";
const LOG_FILE: &str = "playdeck.log";
const DEFAULT_FILTER: &str = "playdeck=info";

pub fn log_path(root: &Path) -> PathBuf {
    root.join(LOG_FILE)
}

/// Sends tracing output to `<root>/playdeck.log`; the terminal belongs to the
/// UI. If the file cannot be opened, events are dropped.
pub fn init(root: &Path) {
    let writer = match open_log(&log_path(root)) {
        Some(file) => BoxMakeWriter::new(Mutex::new(file)),
        None => BoxMakeWriter::new(std::io::sink),
    };

    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .try_init();
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| DEFAULT_FILTER.into())
}

fn open_log(path: &Path) -> Option<File> {
    OpenOptions::new().create(true).append(true).open(path).ok()
}
