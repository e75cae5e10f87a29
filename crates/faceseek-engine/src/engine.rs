//! Engine facade: the public surface composing store, index, search, and
//! aggregation.
//!
//! # Concurrency
//!
//! Insertions are serialized through a single ingest lock — the upstream
//! embedding producer is not thread-safe, so concurrent inserts are
//! forbidden by contract and the lock enforces it. Queries run against a
//! stable `Arc` snapshot of the index: readers clone the `Arc` under a
//! brief read lock and search without holding it, while rebuilds construct
//! the replacement off to the side and swap the reference under a brief
//! write lock. No reader ever observes a torn index.
//!
//! # Recovery
//!
//! The store is authoritative. A missing, corrupt, or out-of-sync index is
//! repaired by rebuilding from `EmbeddingStore::all_active()`; only a
//! corrupt store itself surfaces to the caller as fatal.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

use faceseek_core::{EngineConfig, Result};

use crate::aggregate::group_by_photo;
use crate::index::VectorIndex;
use crate::persistence;
use crate::search::{Orchestrator, SearchPolicy};
use crate::session::SessionRegistry;
use crate::store::EmbeddingStore;
use crate::types::{
    BoundingBox, EngineStats, FaceHit, FaceMetadata, MatchGroup, NewFace, SearchOptions,
};

/// Face-similarity photo retrieval engine.
pub struct FaceSearchEngine {
    config: EngineConfig,
    store: RwLock<EmbeddingStore>,
    index: RwLock<Arc<VectorIndex>>,
    /// Count the index must hold: actives at last rebuild plus appends
    /// since. Divergence is an invariant violation repaired by rebuild.
    expected_index_len: AtomicUsize,
    /// Serializes all mutations (insert, delete, rebuild, reset).
    ingest: Mutex<()>,
    sessions: SessionRegistry,
}

impl FaceSearchEngine {
    /// Open an engine, loading persisted snapshots when a data directory is
    /// configured.
    ///
    /// A corrupt store snapshot is fatal ([`faceseek_core::Error::CorruptStore`]).
    /// A corrupt or dimension-drifted index snapshot is discarded with a
    /// warning and rebuilt from the store.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let store = match &config.data_dir {
            Some(dir) => persistence::load_store(&persistence::store_path(dir), config.dimension)?
                .unwrap_or_else(|| EmbeddingStore::new(config.dimension)),
            None => EmbeddingStore::new(config.dimension),
        };

        let index = match &config.data_dir {
            Some(dir) => {
                match persistence::load_index(&persistence::index_path(dir), config.dimension) {
                    Ok(Some(index)) => Some(index),
                    Ok(None) => None,
                    Err(err) => {
                        log::warn!("discarding index snapshot: {err}; rebuilding from store");
                        None
                    }
                }
            }
            None => None,
        };

        let index = match index {
            Some(index) if index.len() == store.active_len() && !index.needs_training() => index,
            Some(index) => {
                log::warn!(
                    "index out of sync ({} indexed, {} active); rebuilding from store",
                    index.len(),
                    store.active_len()
                );
                Self::build_from_store(&store, &config)
            }
            None => Self::build_from_store(&store, &config),
        };

        log::info!(
            "engine opened: {} active embeddings, dim {}, {}",
            store.active_len(),
            config.dimension,
            index.kind().label()
        );

        let expected = index.len();
        let sessions = SessionRegistry::new(config.session_idle_secs);
        Ok(Self {
            config,
            store: RwLock::new(store),
            index: RwLock::new(Arc::new(index)),
            expected_index_len: AtomicUsize::new(expected),
            ingest: Mutex::new(()),
            sessions,
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The session registry bound to this engine.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Insert one face embedding; returns its assigned id.
    pub async fn insert(
        &self,
        vector: Vec<f32>,
        photo: impl Into<String>,
        bbox: BoundingBox,
        confidence: f32,
        metadata: FaceMetadata,
    ) -> Result<u64> {
        let face = NewFace {
            vector,
            photo: photo.into(),
            bbox,
            confidence,
            metadata,
        };
        let ids = self.insert_batch(vec![face]).await?;
        Ok(ids[0])
    }

    /// Insert a batch of face embeddings; returns their ids in order.
    ///
    /// The store is appended first (it never blocks on the index), then the
    /// index is updated: either incrementally, or by a full rebuild when
    /// the active count crosses the exact-index limit or the index needs
    /// training. Rebuilds always use the full corpus from the store.
    pub async fn insert_batch(&self, faces: Vec<NewFace>) -> Result<Vec<u64>> {
        let _ingest = self.ingest.lock().await;

        let mut store = self.store.write().await;
        let ids = store.append_batch(faces)?;

        let crossed_limit = store.active_len() > self.config.exact_index_limit
            && matches!(&**self.index.read().await, VectorIndex::Exact(_));
        let needs_training = self.index.read().await.needs_training();

        if crossed_limit || needs_training {
            if crossed_limit {
                log::info!(
                    "active count {} crossed exact limit {}; rebuilding as approximate",
                    store.active_len(),
                    self.config.exact_index_limit
                );
            }
            self.swap_rebuilt(&store).await;
        } else {
            let mut index = self.index.write().await;
            let fresh = Arc::make_mut(&mut *index);
            for &id in &ids {
                let face = store
                    .get(id)
                    .ok_or_else(|| faceseek_core::Error::invariant("appended record missing"))?;
                fresh.insert(id, face.vector.clone())?;
            }
            self.expected_index_len
                .fetch_add(ids.len(), Ordering::SeqCst);
        }

        self.repair_if_inconsistent(&store).await;
        self.persist(&store).await?;
        log::debug!(
            "inserted {} embeddings (total active: {})",
            ids.len(),
            store.active_len()
        );
        Ok(ids)
    }

    /// Search for photos containing the person in the query embedding.
    ///
    /// Runs the multi-stage recall-expansion policy, resolves hits through
    /// the store (dropping tombstoned records), and groups them per photo.
    /// An empty index yields an empty list, not an error.
    pub async fn search(
        &self,
        query: &[f32],
        options: SearchOptions,
    ) -> Result<Vec<MatchGroup>> {
        // Stable snapshot: readers never block mutations, or vice versa
        let index = self.index.read().await.clone();

        let policy = SearchPolicy::resolve(&self.config, options);
        let ranked = Orchestrator::new(&index, policy).run(query)?;

        let store = self.store.read().await;
        let hits: Vec<FaceHit> = ranked
            .into_iter()
            .filter_map(|m| {
                let face = store.get(m.id)?;
                if face.record.deleted {
                    return None;
                }
                Some(FaceHit {
                    id: m.id,
                    photo: face.record.photo.clone(),
                    bbox: face.record.bbox,
                    similarity: m.similarity,
                    expanded: m.expanded,
                })
            })
            .collect();

        let groups = group_by_photo(&hits);
        log::debug!(
            "search: {} face hits grouped into {} photos",
            hits.len(),
            groups.len()
        );
        Ok(groups)
    }

    /// Tombstone every face owned by the photo; returns the count.
    ///
    /// Tombstoned faces stop appearing in results immediately (they are
    /// dropped at hit resolution); the index itself is compacted by a full
    /// rebuild once the tombstoned fraction crosses the configured ratio.
    pub async fn delete_by_photo(&self, photo: &str) -> Result<usize> {
        let _ingest = self.ingest.lock().await;

        let mut store = self.store.write().await;
        let count = store.remove_by_photo(photo);
        if count == 0 {
            return Ok(count);
        }
        log::info!("tombstoned {count} faces of photo {photo}");

        if store.tombstone_ratio() > self.config.compaction_ratio {
            log::info!(
                "tombstone ratio {:.2} above {:.2}; compacting via rebuild",
                store.tombstone_ratio(),
                self.config.compaction_ratio
            );
            self.swap_rebuilt(&store).await;
        }

        self.persist(&store).await?;
        Ok(count)
    }

    /// Discard the index and rebuild it from the store's active records.
    pub async fn rebuild_index(&self) -> Result<()> {
        let _ingest = self.ingest.lock().await;
        let store = self.store.write().await;
        self.swap_rebuilt(&store).await;
        self.persist(&store).await
    }

    /// Clear all records and the index. Explicit full reset only.
    pub async fn reset(&self) -> Result<()> {
        let _ingest = self.ingest.lock().await;

        let mut store = self.store.write().await;
        store.reset();
        *self.index.write().await = Arc::new(VectorIndex::new_exact(self.config.dimension));
        self.expected_index_len.store(0, Ordering::SeqCst);

        self.persist(&store).await?;
        log::info!("engine reset");
        Ok(())
    }

    /// Engine statistics snapshot.
    pub async fn stats(&self) -> EngineStats {
        let store = self.store.read().await;
        let index = self.index.read().await;
        EngineStats {
            total_active: store.active_len(),
            total_records: store.len(),
            tombstones: store.tombstone_len(),
            index_kind: index.kind().label(),
            dimension: store.dimension(),
        }
    }

    /// Build a fresh index over the store's full active corpus.
    fn build_from_store(store: &EmbeddingStore, config: &EngineConfig) -> VectorIndex {
        let corpus: Vec<(u64, Vec<f32>)> = store
            .all_active()
            .map(|(id, vector, _)| (id, vector.to_vec()))
            .collect();
        VectorIndex::build(&corpus, config)
    }

    /// Rebuild off to the side and atomically swap the index reference.
    /// Caller holds the ingest lock and the store guard.
    async fn swap_rebuilt(&self, store: &EmbeddingStore) {
        let rebuilt = Self::build_from_store(store, &self.config);
        self.expected_index_len
            .store(rebuilt.len(), Ordering::SeqCst);
        *self.index.write().await = Arc::new(rebuilt);
    }

    /// Detect index/store count divergence and repair it by rebuilding.
    /// Logged as a recoverable internal event, never silently ignored.
    async fn repair_if_inconsistent(&self, store: &EmbeddingStore) {
        let indexed = self.index.read().await.len();
        let expected = self.expected_index_len.load(Ordering::SeqCst);
        if indexed != expected {
            log::warn!(
                "index invariant violation: {indexed} indexed, {expected} expected; \
                 forcing rebuild from store"
            );
            self.swap_rebuilt(store).await;
        }
    }

    /// Persist both snapshots when a data directory is configured.
    async fn persist(&self, store: &EmbeddingStore) -> Result<()> {
        let Some(dir) = &self.config.data_dir else {
            return Ok(());
        };
        persistence::save_store(&persistence::store_path(dir), store)?;
        let index = self.index.read().await.clone();
        persistence::save_index(&persistence::index_path(dir), &index)?;
        Ok(())
    }
}

impl std::fmt::Debug for FaceSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceSearchEngine")
            .field("dimension", &self.config.dimension)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
