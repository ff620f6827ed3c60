//! LiveSync CLI
//!
//! `run` subscribes to a feed and drives a console view, `status` shows the
//! saved snapshot, `patch-record` writes to a record endpoint.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use livesync::config::{Cli, Command, RunArgs};
use livesync::display::{self, DEFAULT_VISIBLE_RECORDS};
use livesync::persistence::FileSink;
use livesync::repl::{self, ReplCommand};
use livesync::session::{resolve_transport, LiveSession};
use livesync::{cmd_status, logging, paths, SyncConfig};
use livesync_connectors::patch_record;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = paths::init_data_dir(cli.data_dir.as_deref());

    match cli.command {
        Command::Status => cmd_status::run(&data_dir),
        Command::PatchRecord { url, body } => patch(&url, &body).await,
        Command::Run(args) => {
            paths::ensure_dirs()
                .with_context(|| format!("creating data dir {}", data_dir.display()))?;
            let log_handle = logging::init_logging()?;
            info!(
                component = "main",
                event = "main.starting",
                run_id = %log_handle.run_id,
                log_path = %log_handle.log_path.display(),
                version = livesync::VERSION,
                data_dir = %data_dir.display(),
            );
            let result = run(args).await;
            drop(log_handle.guard);
            result
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = SyncConfig::from(args);
    let client = reqwest::Client::new();
    let transport = resolve_transport(&config, &client).await;
    let sink = Arc::new(FileSink::new(paths::state_path()));

    let mut session = LiveSession::start(config, sink, transport);
    let store = session.store();
    let stats = session.pipeline_stats();
    info!(
        component = "main",
        event = "main.session_ready",
        session_id = %session.id(),
    );

    println!("  LiveSync v{}  (type `help` for commands)", livesync::VERSION);
    print!("{}", display::render(&store.get(), DEFAULT_VISIBLE_RECORDS));

    // Redraw the status line on every committed change; full view on demand.
    let mut revisions = store.subscribe();
    let watcher_store = store.clone();
    let watcher = tokio::spawn(async move {
        let mut last_status = String::new();
        let mut last_len = 0;
        while revisions.changed().await.is_ok() {
            let state = watcher_store.get();
            if state.status != last_status || state.records.len() != last_len {
                last_status = state.status.clone();
                last_len = state.records.len();
                println!("{}", display::status_line(&state));
            }
        }
    });

    session.mount().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match repl::parse(&line) {
                    Ok(ReplCommand::Actions(actions)) => {
                        for action in actions {
                            session.dispatch(action).await;
                        }
                        print!("{}", display::render(&store.get(), DEFAULT_VISIBLE_RECORDS));
                    }
                    Ok(ReplCommand::Show) => {
                        print!("{}", display::render(&store.get(), DEFAULT_VISIBLE_RECORDS));
                    }
                    Ok(ReplCommand::Help) => println!("{}", repl::HELP),
                    Ok(ReplCommand::Quit) => break,
                    Err(message) => println!("  {}", message),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    watcher.abort();
    session.shutdown().await;
    println!(
        "  Received {} frames ({} records, {} noise)",
        stats.processed(),
        stats.structured(),
        stats.noise()
    );
    Ok(())
}

async fn patch(url: &str, body: &str) -> anyhow::Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(body).context("--body must be a JSON object")?;
    let client = reqwest::Client::new();
    patch_record(&client, url, &value).await?;
    println!("  Updated {}", url);
    Ok(())
}
