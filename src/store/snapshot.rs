//! On-disk persistence of the [`MatchStore`].
//!
//! The file is a JSON object mapping route identifiers to arrays of
//! cached values. Saves go through a sibling temporary file followed by a
//! rename so a crash mid-write never leaves a truncated snapshot behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{MatchStore, Snapshot};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads a snapshot. A missing file is an empty snapshot.
pub async fn load_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::new()),
        Err(source) => {
            return Err(SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Snapshot::new());
    }
    serde_json::from_slice(&raw).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the current contents of `store` to `path`.
///
/// Returns the number of values written.
pub async fn save_snapshot(path: &Path, store: &MatchStore) -> Result<usize, SnapshotError> {
    let snapshot = store.snapshot();
    let count = snapshot.values().map(Vec::len).sum();
    let body = serde_json::to_vec(&snapshot).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &body).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(count)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Loads `path` into `store`, logging and continuing on failure.
pub async fn restore(path: &Path, store: &MatchStore) {
    match load_snapshot(path).await {
        Ok(snapshot) => {
            let routes = snapshot.len();
            store.load(snapshot);
            tracing::info!(
                path = %path.display(),
                routes,
                values = store.total(),
                "snapshot loaded"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to load snapshot, starting with an empty cache");
        }
    }
}

/// Periodic snapshot task.
pub struct SnapshotWriter;

impl SnapshotWriter {
    /// Saves every `interval` and once more when `cancel` fires.
    ///
    /// The returned handle completes only after the final save, so
    /// awaiting it guarantees the shutdown flush hit the disk.
    pub fn spawn(
        store: Arc<MatchStore>,
        path: PathBuf,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = save_snapshot(&path, &store).await {
                            tracing::warn!(error = %e, "snapshot save failed");
                        }
                    }
                }
            }

            match save_snapshot(&path, &store).await {
                Ok(values) => tracing::info!(path = %path.display(), values, "final snapshot saved"),
                Err(e) => tracing::warn!(error = %e, "final snapshot save failed"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = load_snapshot(&dir.path().join("absent.json")).await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let store = MatchStore::new();
        store.add("route-a", "one");
        store.add("route-b", "two");
        assert_eq!(save_snapshot(&path, &store).await.unwrap(), 2);
        assert!(!temp_path(&path).exists());

        let restored = MatchStore::new();
        restored.load(load_snapshot(&path).await.unwrap());
        assert!(restored.contains("route-a", "one"));
        assert!(restored.contains("route-b", "two"));
        assert!(!restored.contains("route-a", "two"));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_and_restore_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        assert!(matches!(
            load_snapshot(&path).await,
            Err(SnapshotError::Json { .. })
        ));

        let store = MatchStore::new();
        store.add("route", "kept");
        restore(&path, &store).await;
        assert!(store.contains("route", "kept"));
    }

    #[tokio::test]
    async fn writer_flushes_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = Arc::new(MatchStore::new());
        let cancel = CancellationToken::new();

        let handle = SnapshotWriter::spawn(
            Arc::clone(&store),
            path.clone(),
            Duration::from_secs(3600),
            cancel.clone(),
        );
        store.add("route", "late");
        cancel.cancel();
        handle.await.unwrap();

        let snapshot = load_snapshot(&path).await.unwrap();
        assert_eq!(snapshot.get("route"), Some(&vec!["late".to_string()]));
    }

    #[tokio::test]
    async fn writer_saves_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = Arc::new(MatchStore::new());
        let cancel = CancellationToken::new();
        store.add("route", "v");

        let handle = SnapshotWriter::spawn(
            Arc::clone(&store),
            path.clone(),
            Duration::from_millis(20),
            cancel.clone(),
        );

        for _ in 0..100 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(path.exists(), "no periodic snapshot written");

        cancel.cancel();
        handle.await.unwrap();
    }
}
