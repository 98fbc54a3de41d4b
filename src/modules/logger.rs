//! Process-wide tracing setup.
//!
//! Console output is plain text, or one JSON object per line when
//! `GATEWAY_LOG_FORMAT=json`. A daily rolling `gateway.log` is kept under
//! `<data dir>/logs` when that directory is writable. `RUST_LOG` replaces the
//! default filter, which already logs each proxied request via `tower_http`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::{self, format::FmtSpan, time::FormatTime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::modules::config::get_data_dir;

const LOG_FILE_PREFIX: &str = "gateway.log";
const DEFAULT_FILTER: &str = "info,tower_http=debug,hyper=warn,reqwest=warn";
const WRITE_CHECK_FILE: &str = ".gateway-write-check";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Anything other than `json` (any case) selects text
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().to_rfc3339())
    }
}

pub fn get_log_dir() -> Result<PathBuf, String> {
    let log_dir = get_data_dir()?.join("logs");
    fs::create_dir_all(&log_dir)
        .map_err(|e| format!("Failed to create log directory {}: {}", log_dir.display(), e))?;
    Ok(log_dir)
}

pub fn init_logger() {
    // dependencies that still emit through `log`
    let _ = tracing_log::LogTracer::init();

    let format = LogFormat::from_env_value(std::env::var("GATEWAY_LOG_FORMAT").ok().as_deref());
    let mut layers: Vec<BoxedLayer> = vec![console_layer(format)];

    let file = match get_log_dir() {
        Ok(dir) => file_writer(&dir),
        Err(e) => {
            eprintln!("{}; logging to console only", e);
            None
        }
    };
    let to_file = file.is_some();
    if let Some((writer, guard)) = file {
        layers.push(file_layer(format, writer));
        // flushing stops when the guard drops
        std::mem::forget(guard);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .is_ok()
    {
        tracing::info!(?format, to_file, "Logging initialized");
    }
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer().with_target(false).with_timer(LocalTimer).boxed(),
        LogFormat::Json => fmt::layer().json().flatten_event(true).with_timer(LocalTimer).boxed(),
    }
}

/// File output always carries targets, and span close timings so request latency is on disk
fn file_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(LocalTimer)
        .with_span_events(FmtSpan::CLOSE);
    match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
    }
}

fn file_writer(dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    if !is_log_dir_writable(dir) {
        eprintln!("Log directory {} is not writable; logging to console only", dir.display());
        return None;
    }
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(appender))
}

fn is_log_dir_writable(dir: &Path) -> bool {
    let marker = dir.join(WRITE_CHECK_FILE);
    let written = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&marker)
        .and_then(|mut f| f.write_all(b"ok"));
    written.is_ok() && fs::remove_file(&marker).is_ok()
}
