//! Central path resolution for LiveSync data files.
//!
//! Resolved once at startup from: CLI `--data-dir` > `LIVESYNC_DATA_DIR` env > `~/.livesync`.
//! All callsites use these helpers instead of constructing paths from `HOME`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

static DATA_DIR: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Initialize the global data directory. Returns the resolved path.
///
/// Priority: `explicit` arg > `LIVESYNC_DATA_DIR` env > `~/.livesync` default,
/// falling back to the working directory when no home directory exists.
pub fn init_data_dir(explicit: Option<&Path>) -> PathBuf {
    let dir = resolve(explicit);
    let mut guard = DATA_DIR.write().unwrap_or_else(|e| e.into_inner());
    *guard = Some(dir.clone());
    dir
}

fn resolve(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        p.to_path_buf()
    } else if let Ok(env_val) = std::env::var("LIVESYNC_DATA_DIR") {
        PathBuf::from(env_val)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".livesync")
    }
}

/// Return the current data directory, resolving defaults if
/// `init_data_dir` hasn't been called.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = DATA_DIR.read().unwrap_or_else(|e| e.into_inner()).clone() {
        return dir;
    }
    init_data_dir(None)
}

pub fn state_path() -> PathBuf {
    data_dir().join("state.json")
}

pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Create all required subdirectories under the data dir.
pub fn ensure_dirs() -> io::Result<()> {
    let base = data_dir();
    std::fs::create_dir_all(&base)?;
    std::fs::create_dir_all(base.join("logs"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve(Some(dir.path())), dir.path());
    }

    #[test]
    fn files_live_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let base = init_data_dir(Some(dir.path()));
        assert_eq!(state_path(), base.join("state.json"));
        assert_eq!(log_dir(), base.join("logs"));

        ensure_dirs().unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}
