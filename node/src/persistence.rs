use crate::error::Result;
use crate::stats::{Snapshot, TrafficStore};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// No snapshot on disk yet
    Missing,
    Loaded {
        users: usize,
        mappings: usize,
    },
    /// The snapshot could not be read and was ignored
    Discarded,
}

/// Saves the traffic store to a JSON snapshot and loads it back.
///
/// A save goes to `<path>.tmp` in the same directory, is synced and then
/// renamed over `path`, so a crash at any point leaves either the old or the
/// new snapshot in place.
pub struct DurabilityManager {
    store: Arc<TrafficStore>,
    path: PathBuf,
    persist_lock: Mutex<()>,
}

impl DurabilityManager {
    pub fn new(store: Arc<TrafficStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn restore(&self) -> RestoreOutcome {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting empty", self.path.display());
                return RestoreOutcome::Missing;
            }
            Err(e) => {
                error!("Failed to read snapshot {}: {}", self.path.display(), e);
                return RestoreOutcome::Discarded;
            }
        };

        let snapshot: Snapshot = match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Snapshot {} is corrupt, starting empty: {}",
                    self.path.display(),
                    e
                );
                return RestoreOutcome::Discarded;
            }
        };

        let users = snapshot.users.len();
        let mappings = snapshot.mappings.len();
        self.store.restore(snapshot);
        info!(
            "Restored {} users and {} mappings from {}",
            users,
            mappings,
            self.path.display()
        );
        RestoreOutcome::Loaded { users, mappings }
    }

    /// Write the current state. Only the state captured here is marked saved;
    /// anything recorded meanwhile stays dirty.
    pub fn persist(&self) -> Result<()> {
        let _serialized = self.persist_lock.lock();
        let (snapshot, mark) = self.store.capture();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        write_atomically(&self.path, &bytes)?;
        self.store.mark_saved(mark);
        debug!(
            "Saved {} users to {}",
            snapshot.users.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Returns whether a save happened.
    pub fn persist_if_dirty(&self) -> Result<bool> {
        if !self.store.is_dirty() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Saves every `every` while dirty until `shutdown` fires, then saves once more.
    pub async fn run(self: Arc<Self>, every: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        info!(
            "Snapshot scheduler started, interval {:?}, file {}",
            every,
            self.path.display()
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.flush(false).await {
                        error!("Periodic save failed, will retry: {}", e);
                    }
                }
            }
        }

        match self.flush(true).await {
            Ok(_) => info!("Final snapshot written to {}", self.path.display()),
            Err(e) => error!("Final save failed: {}", e),
        }
    }

    async fn flush(self: &Arc<Self>, force: bool) -> Result<bool> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || {
            if force {
                manager.persist().map(|_| true)
            } else {
                manager.persist_if_dirty()
            }
        })
        .await?
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });

    if let Err(e) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    sync_parent_dir(path);
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    if let Err(e) = File::open(dir).and_then(|dir| dir.sync_all()) {
        debug!("Could not sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
