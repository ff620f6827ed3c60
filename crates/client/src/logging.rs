//! File logging for `livesync run`.
//!
//! The terminal belongs to the status display, so every event goes to
//! `<data_dir>/logs/livesync.log`. Lifecycle transitions log at info and
//! transport errors at warn. Per-frame noise logs at debug under the
//! pipeline target and is enabled separately with `LIVESYNC_LOG_NOISE=1`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::paths;

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn";
const NOISE_DIRECTIVE: &str = "livesync::pipeline=debug";
const LOG_FILE: &str = "livesync.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Filter directives from `LIVESYNC_LOG_FILTER`, then `RUST_LOG`, then the
/// default, with the pipeline noise directive appended when requested.
/// Unparseable sources are skipped.
fn filter_directives(custom: Option<&str>, rust_log: Option<&str>, noise: bool) -> String {
    let base = [custom, rust_log]
        .into_iter()
        .flatten()
        .find(|value| EnvFilter::try_new(value).is_ok())
        .unwrap_or(DEFAULT_FILTER);
    if noise {
        format!("{base},{NOISE_DIRECTIVE}")
    } else {
        base.to_string()
    }
}

fn run_id(explicit: Option<String>) -> String {
    explicit.unwrap_or_else(|| {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("pid-{}-{}", std::process::id(), now)
    })
}

pub struct LoggingHandle {
    pub run_id: String,
    pub log_path: PathBuf,
    pub guard: WorkerGuard,
}

pub fn init_logging() -> anyhow::Result<LoggingHandle> {
    let log_dir = paths::log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(LOG_FILE);

    if std::env::var("LIVESYNC_TRUNCATE_LOG_ON_START").as_deref() == Ok("1") {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_path)?;
    }

    let directives = filter_directives(
        std::env::var("LIVESYNC_LOG_FILTER").ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
        std::env::var("LIVESYNC_LOG_NOISE").as_deref() == Ok("1"),
    );
    let filter = EnvFilter::try_new(&directives)?;
    let format = std::env::var("LIVESYNC_LOG_FORMAT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LogFormat::Json);

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, LOG_FILE));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .pretty()
                    .with_target(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .flatten_event(true)
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init()?,
    }

    let run_id = run_id(std::env::var("LIVESYNC_RUN_ID").ok());
    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        run_id = %run_id,
        log_path = %log_path.display(),
        format = ?format,
        filter = %directives,
    );

    Ok(LoggingHandle {
        run_id,
        log_path,
        guard,
    })
}
