//! LiveSync
//!
//! Keeps a long-lived subscription to a server-sent event feed, decodes
//! frames into a bounded record buffer and drives a reactive UI state store,
//! reconnecting on failure.

pub mod actions;
pub mod classifier;
pub mod cmd_status;
pub mod config;
pub mod display;
pub mod logging;
pub mod paths;
pub mod persistence;
pub mod pipeline;
pub mod record_buffer;
pub mod repl;
pub mod session;
pub mod store;
pub mod supervisor;
pub mod transition;
pub mod watchdog;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{SyncConfig, TransportChoice};
pub use session::LiveSession;
pub use store::{Store, UiState};
pub use supervisor::SupervisorHandle;
