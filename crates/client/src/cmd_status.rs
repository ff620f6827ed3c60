//! `livesync status`: show the data dir and the saved snapshot.

use std::path::Path;

use crate::paths;
use crate::persistence::{restore, FileSink, SnapshotSink};
use crate::VERSION;

pub fn run(data_dir: &Path) -> anyhow::Result<()> {
    println!();
    println!("  LiveSync v{}", VERSION);
    println!("  Data dir: {}", data_dir.display());

    let sink = FileSink::new(paths::state_path());
    match sink.load() {
        Ok(Some(data)) => {
            println!("  Snapshot: {} ({} bytes)", sink.path().display(), data.len());
            let state = restore(&data);
            println!("    count: {}", state.count);
            println!("    todos: {}", state.todos.len());
            println!("    completed: {}", state.completed.len());
            if !state.input_text.is_empty() {
                println!("    input: {:?}", state.input_text);
            }
        }
        Ok(None) => println!("  Snapshot: not found"),
        Err(e) => println!("  Snapshot: unreadable ({})", e),
    }

    let log_path = paths::log_dir().join("livesync.log");
    if log_path.exists() {
        let size = std::fs::metadata(&log_path).map(|m| m.len()).unwrap_or(0);
        println!("  Log: {} ({} KB)", log_path.display(), size / 1024);
    } else {
        println!("  Log: not found");
    }

    println!();
    Ok(())
}
