//! JSON-snapshot pairing store.
//!
//! Same semantics as [`MemoryStore`](crate::MemoryStore), plus the full
//! row set is rewritten to a JSON file after every mutation and loaded
//! back at startup. Writes go to a `.tmp` file first and are renamed
//! into place so a crash mid-write never corrupts the snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use roulette_common::{StoreError, UserId};

use crate::store::{PairStore, PairingState};

/// One persisted row, mirroring the logical `users` table.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRow {
    user_id: UserId,
    pair_id: Option<UserId>,
}

/// Pairing store backed by a JSON snapshot file.
#[derive(Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    rows: Arc<RwLock<HashMap<UserId, Option<UserId>>>>,
}

impl SnapshotStore {
    /// Open the store at `path`, loading existing rows if the snapshot
    /// file is present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let rows = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                StoreError::Unavailable(format!("failed to read {}: {e}", path.display()))
            })?;
            let loaded: Vec<SnapshotRow> = serde_json::from_str(&contents).map_err(|e| {
                StoreError::Unavailable(format!("failed to parse {}: {e}", path.display()))
            })?;
            info!(path = %path.display(), rows = loaded.len(), "Loaded pairing snapshot");
            loaded
                .into_iter()
                .map(|r| (r.user_id, r.pair_id))
                .collect()
        } else {
            info!(path = %path.display(), "No pairing snapshot, starting empty");
            HashMap::new()
        };

        Ok(Self {
            path,
            rows: Arc::new(RwLock::new(rows)),
        })
    }

    /// Serialize all rows and atomically replace the snapshot file.
    fn persist(path: &Path, rows: &HashMap<UserId, Option<UserId>>) -> Result<(), StoreError> {
        let mut out: Vec<SnapshotRow> = rows
            .iter()
            .map(|(user_id, pair_id)| SnapshotRow {
                user_id: *user_id,
                pair_id: *pair_id,
            })
            .collect();
        // Stable ordering keeps the file diffable.
        out.sort_by_key(|r| r.user_id);

        let json = serde_json::to_string_pretty(&out).map_err(|e| {
            StoreError::Unavailable(format!("failed to serialize snapshot: {e}"))
        })?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "failed to create snapshot directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        // Atomic write: write to .tmp, then rename.
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| {
            StoreError::Unavailable(format!(
                "failed to write snapshot to {}: {e}",
                tmp_path.display()
            ))
        })?;

        if let Err(e) = std::fs::rename(&tmp_path, path) {
            // Rename failed — try direct write as fallback (Windows compat)
            warn!("atomic rename failed ({}), falling back to direct write", e);
            std::fs::write(path, &json).map_err(|e2| {
                StoreError::Unavailable(format!(
                    "failed to write snapshot to {}: {e2}",
                    path.display()
                ))
            })?;
        }

        debug!(path = %path.display(), rows = out.len(), "Snapshot saved");
        Ok(())
    }
}

#[async_trait]
impl PairStore for SnapshotStore {
    async fn upsert(&self, user: UserId, pair: Option<UserId>) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let previous = rows.insert(user, pair);
        if let Err(e) = Self::persist(&self.path, &rows) {
            // Roll back so callers never observe a mutation the
            // snapshot doesn't have.
            match previous {
                Some(prev) => rows.insert(user, prev),
                None => rows.remove(&user),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn get_pair(&self, user: UserId) -> Result<Option<UserId>, StoreError> {
        Ok(self.rows.read().await.get(&user).copied().flatten())
    }

    async fn state_of(&self, user: UserId) -> Result<PairingState, StoreError> {
        Ok(match self.rows.read().await.get(&user) {
            None => PairingState::Idle,
            Some(None) => PairingState::Waiting,
            Some(Some(partner)) => PairingState::Paired(*partner),
        })
    }

    async fn delete(&self, user: UserId) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let previous = rows.remove(&user);
        if let Err(e) = Self::persist(&self.path, &rows) {
            if let Some(prev) = previous {
                rows.insert(user, prev);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn find_waiting_excluding(&self, user: UserId) -> Result<Option<UserId>, StoreError> {
        let rows = self.rows.read().await;
        let candidate = rows
            .iter()
            .filter(|(id, pair)| **id != user && pair.is_none())
            .map(|(id, _)| *id)
            .choose(&mut rand::thread_rng());
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_without_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path().join("pairs.json")).unwrap();
        assert_eq!(
            store.state_of(UserId::new(1)).await.unwrap(),
            PairingState::Idle
        );
    }

    #[tokio::test]
    async fn rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pairs.json");

        let store = SnapshotStore::open(&path).unwrap();
        store.upsert(UserId::new(1), Some(UserId::new(2))).await.unwrap();
        store.upsert(UserId::new(2), Some(UserId::new(1))).await.unwrap();
        store.upsert(UserId::new(3), None).await.unwrap();
        drop(store);

        let store = SnapshotStore::open(&path).unwrap();
        assert_eq!(
            store.state_of(UserId::new(1)).await.unwrap(),
            PairingState::Paired(UserId::new(2))
        );
        assert_eq!(
            store.state_of(UserId::new(2)).await.unwrap(),
            PairingState::Paired(UserId::new(1))
        );
        assert_eq!(
            store.state_of(UserId::new(3)).await.unwrap(),
            PairingState::Waiting
        );
    }

    #[tokio::test]
    async fn delete_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pairs.json");

        let store = SnapshotStore::open(&path).unwrap();
        store.upsert(UserId::new(1), None).await.unwrap();
        store.delete(UserId::new(1)).await.unwrap();
        drop(store);

        let store = SnapshotStore::open(&path).unwrap();
        assert_eq!(
            store.state_of(UserId::new(1)).await.unwrap(),
            PairingState::Idle
        );
    }

    #[tokio::test]
    async fn snapshot_cleans_up_tmp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pairs.json");

        let store = SnapshotStore::open(&path).unwrap();
        store.upsert(UserId::new(1), None).await.unwrap();

        let tmp_path = path.with_extension("json.tmp");
        assert!(
            !tmp_path.exists(),
            "tmp file should be gone after rename"
        );
        assert!(path.exists());
    }

    #[tokio::test]
    async fn open_rejects_corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pairs.json");
        std::fs::write(&path, "this is not valid json {{{").unwrap();

        let result = SnapshotStore::open(&path);
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn snapshot_file_is_valid_json_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pairs.json");

        let store = SnapshotStore::open(&path).unwrap();
        store.upsert(UserId::new(7), Some(UserId::new(8))).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["user_id"], 7);
        assert_eq!(rows[0]["pair_id"], 8);
    }

    #[tokio::test]
    async fn creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deep").join("pairs.json");

        let store = SnapshotStore::open(&path).unwrap();
        store.upsert(UserId::new(1), None).await.unwrap();
        assert!(path.exists());
    }
}
