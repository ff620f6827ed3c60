//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use livesync_connectors::polling::DEFAULT_POLL_INTERVAL;

use crate::record_buffer::{DEFAULT_CAPACITY, MAX_CAPACITY};

use crate::transition::Timing;

#[derive(Parser, Debug)]
#[command(name = "livesync", version)]
#[command(about = "Live-data synchronization client for server-sent event feeds")]
pub struct Cli {
    /// Data directory for the snapshot and logs (default: ~/.livesync)
    #[arg(long, env = "LIVESYNC_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Subscribe to a feed and show live status, records and todos
    Run(RunArgs),

    /// Show version, data dir and the saved snapshot
    Status,

    /// Send a JSON PATCH to a record endpoint
    PatchRecord {
        /// Record URL (e.g., https://host/api/records/v1/people/42)
        #[arg(long)]
        url: String,

        /// JSON object with the fields to change
        #[arg(long)]
        body: String,
    },
}

/// How the feed is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportChoice {
    /// Probe the feed and pick SSE or polling
    Auto,
    Sse,
    Polling,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Server-sent event feed to subscribe to
    #[arg(long, env = "LIVESYNC_FEED_URL")]
    pub feed_url: String,

    #[arg(long, value_enum, env = "LIVESYNC_TRANSPORT", default_value = "auto")]
    pub transport: TransportChoice,

    /// URL polled by the polling transport (default: the feed URL)
    #[arg(long, env = "LIVESYNC_POLL_URL")]
    pub poll_url: Option<String>,

    #[arg(long, default_value_t = 3000, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    #[arg(long, env = "LIVESYNC_RECONNECT_DELAY_MS", default_value_t = 2000)]
    pub reconnect_delay_ms: u64,

    #[arg(long, env = "LIVESYNC_WATCHDOG_TIMEOUT_MS", default_value_t = 60_000)]
    pub watchdog_timeout_ms: u64,

    /// Most recent records kept in memory
    #[arg(
        long,
        default_value_t = DEFAULT_CAPACITY,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_CAPACITY as u64)
    )]
    pub buffer_capacity: usize,

    /// Delay of the second, lifecycle-driven start trigger
    #[arg(long, default_value_t = 250)]
    pub auto_connect_delay_ms: u64,
}

/// Resolved settings for one live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub feed_url: String,
    pub transport: TransportChoice,
    pub poll_url: Option<String>,
    pub poll_interval: Duration,
    pub timing: Timing,
    pub buffer_capacity: usize,
    pub auto_connect_delay: Duration,
}

impl SyncConfig {
    pub fn new(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            transport: TransportChoice::Auto,
            poll_url: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timing: Timing::default(),
            buffer_capacity: DEFAULT_CAPACITY,
            auto_connect_delay: Duration::from_millis(250),
        }
    }
}

impl From<RunArgs> for SyncConfig {
    fn from(args: RunArgs) -> Self {
        Self {
            feed_url: args.feed_url,
            transport: args.transport,
            poll_url: args.poll_url,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            timing: Timing {
                reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
                watchdog_timeout: Duration::from_millis(args.watchdog_timeout_ms),
            },
            buffer_capacity: args.buffer_capacity,
            auto_connect_delay: Duration::from_millis(args.auto_connect_delay_ms),
        }
    }
}
