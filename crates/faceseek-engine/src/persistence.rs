//! Snapshot persistence for the store and index.
//!
//! Both snapshots are JSON files written atomically: serialized to a
//! temporary file in the same directory, then renamed over the target, so a
//! crash mid-write never leaves a readable-but-corrupt file behind. Loading
//! validates the embedded dimension tag against the configured dimension to
//! guard against configuration drift.
//!
//! Corruption is asymmetric by design: an unreadable index snapshot is
//! recoverable (rebuild from the store), an unreadable store snapshot is
//! not (the store is the source of truth).

use faceseek_core::{Error, Result};
use std::path::{Path, PathBuf};

use crate::index::VectorIndex;
use crate::store::EmbeddingStore;

/// Store snapshot file name within the data directory.
const STORE_FILE: &str = "store.json";

/// Index snapshot file name within the data directory.
const INDEX_FILE: &str = "index.json";

/// Path of the store snapshot under a data directory.
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE)
}

/// Path of the index snapshot under a data directory.
pub fn index_path(data_dir: &Path) -> PathBuf {
    data_dir.join(INDEX_FILE)
}

/// Write bytes atomically: temp file in the target directory, then rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Persist the embedding store.
pub fn save_store(path: &Path, store: &EmbeddingStore) -> Result<()> {
    let json = serde_json::to_vec(store)?;
    write_atomic(path, &json)?;
    log::debug!(
        "persisted store: {} records ({} active) to {}",
        store.len(),
        store.active_len(),
        path.display()
    );
    Ok(())
}

/// Load the embedding store snapshot.
///
/// Returns `Ok(None)` when no snapshot exists yet. Any unreadable or
/// inconsistent snapshot is [`Error::CorruptStore`]: the caller must treat
/// the store as empty and alert, never resume with partial data.
pub fn load_store(path: &Path, dimension: usize) -> Result<Option<EmbeddingStore>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)
        .map_err(|e| Error::corrupt_store(format!("{}: {e}", path.display())))?;
    let store: EmbeddingStore = serde_json::from_str(&json)
        .map_err(|e| Error::corrupt_store(format!("{}: {e}", path.display())))?;
    store.validate(dimension)?;
    log::info!(
        "loaded store: {} records ({} active) from {}",
        store.len(),
        store.active_len(),
        path.display()
    );
    Ok(Some(store))
}

/// Persist the vector index.
pub fn save_index(path: &Path, index: &VectorIndex) -> Result<()> {
    let json = serde_json::to_vec(index)?;
    write_atomic(path, &json)?;
    log::debug!(
        "persisted index: {} vectors ({}) to {}",
        index.len(),
        index.kind().label(),
        path.display()
    );
    Ok(())
}

/// Load the vector index snapshot.
///
/// Returns `Ok(None)` when no snapshot exists. An unreadable snapshot, or
/// one whose dimension tag differs from the configured dimension, is
/// [`Error::CorruptIndex`] — the caller discards it and rebuilds from the
/// store rather than using it.
pub fn load_index(path: &Path, dimension: usize) -> Result<Option<VectorIndex>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)
        .map_err(|e| Error::corrupt_index(format!("{}: {e}", path.display())))?;
    let index: VectorIndex = serde_json::from_str(&json)
        .map_err(|e| Error::corrupt_index(format!("{}: {e}", path.display())))?;
    if index.dimension() != dimension {
        return Err(Error::corrupt_index(format!(
            "snapshot dimension {} does not match configured {}",
            index.dimension(),
            dimension
        )));
    }
    log::info!(
        "loaded index: {} vectors ({}) from {}",
        index.len(),
        index.kind().label(),
        path.display()
    );
    Ok(Some(index))
}

// ============================================================================
// Tests
// ============================================================================
