//! In-memory vector index: exact linear scan or clustered approximate.
//!
//! Small corpora use an exact flat index (linear inner-product scan, exact
//! recall). Once the active record count crosses the configured limit the
//! index is rebuilt as an approximate one: vectors are partitioned into
//! `ceil(sqrt(n))` clusters by a k-means quantizer and queries scan only the
//! `probe_count` nearest clusters.
//!
//! Any rebuild trains on the full active corpus handed in by the caller —
//! never just the most recent batch — so migrating from exact to approximate
//! cannot discard previously indexed vectors. The embedding store retains
//! every vector independently; nothing is ever extracted back out of the
//! index structure itself.

use faceseek_core::{EngineConfig, Error, Result, vecmath};
use serde::{Deserialize, Serialize};

/// Index variant descriptor, as reported by `stats()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Flat inner-product scan.
    Exact,
    /// Clustered approximate index.
    Approximate {
        /// Number of clusters in the quantizer.
        cluster_count: usize,
        /// Clusters scanned per query.
        probe_count: usize,
        /// Whether the quantizer has been trained.
        trained: bool,
    },
}

impl IndexKind {
    /// Human-readable label for diagnostics and stats.
    pub fn label(&self) -> String {
        match self {
            Self::Exact => "exact (flat inner product)".to_string(),
            Self::Approximate {
                cluster_count,
                probe_count,
                trained,
            } => format!(
                "approximate (ivf, {cluster_count} clusters, {probe_count} probes{})",
                if *trained { "" } else { ", untrained" }
            ),
        }
    }
}

/// One indexed vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    id: u64,
    vector: Vec<f32>,
}

/// Flat index: all vectors in one list, scanned linearly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// Clustered approximate index (inverted file over a k-means quantizer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproxIndex {
    dimension: usize,
    cluster_count: usize,
    probe_count: usize,
    trained: bool,
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<IndexEntry>>,
}

/// Search structure over the active corpus.
///
/// Derived state: may be destroyed and rebuilt from the embedding store at
/// any time. Serialized after batch mutations; a deserialized index whose
/// dimension tag differs from the configured one must be discarded and
/// rebuilt rather than used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VectorIndex {
    Exact(ExactIndex),
    Approximate(ApproxIndex),
}

impl VectorIndex {
    /// Create an empty exact index.
    pub fn new_exact(dimension: usize) -> Self {
        Self::Exact(ExactIndex {
            dimension,
            entries: Vec::new(),
        })
    }

    /// Build an index over the full active corpus, choosing the variant by
    /// corpus size against `config.exact_index_limit`.
    pub fn build(corpus: &[(u64, Vec<f32>)], config: &EngineConfig) -> Self {
        if corpus.len() <= config.exact_index_limit {
            log::debug!("building exact index over {} vectors", corpus.len());
            let entries = corpus
                .iter()
                .map(|(id, v)| IndexEntry {
                    id: *id,
                    vector: v.clone(),
                })
                .collect();
            Self::Exact(ExactIndex {
                dimension: config.dimension,
                entries,
            })
        } else {
            let cluster_count = (corpus.len() as f64).sqrt().ceil() as usize;
            let cluster_count = cluster_count.clamp(1, corpus.len());
            log::info!(
                "building approximate index: {} vectors, {} clusters, {} probes",
                corpus.len(),
                cluster_count,
                config.probe_count
            );
            let mut index = ApproxIndex {
                dimension: config.dimension,
                cluster_count,
                probe_count: config.probe_count.min(cluster_count),
                trained: false,
                centroids: Vec::new(),
                lists: Vec::new(),
            };
            index.train(corpus, config.kmeans_iterations);
            Self::Approximate(index)
        }
    }

    /// The dimension this index was built for.
    pub fn dimension(&self) -> usize {
        match self {
            Self::Exact(e) => e.dimension,
            Self::Approximate(a) => a.dimension,
        }
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        match self {
            Self::Exact(e) => e.entries.len(),
            Self::Approximate(a) => a.lists.iter().map(Vec::len).sum(),
        }
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current variant descriptor.
    pub fn kind(&self) -> IndexKind {
        match self {
            Self::Exact(_) => IndexKind::Exact,
            Self::Approximate(a) => IndexKind::Approximate {
                cluster_count: a.cluster_count,
                probe_count: a.probe_count,
                trained: a.trained,
            },
        }
    }

    /// Whether inserting requires a training pass over the full corpus
    /// first. True only for an untrained approximate index; the caller
    /// resolves it by rebuilding from the embedding store.
    pub fn needs_training(&self) -> bool {
        matches!(self, Self::Approximate(a) if !a.trained)
    }

    /// Insert a single vector under the given id.
    ///
    /// The vector must already be unit-normalized (the store guarantees
    /// this). An untrained approximate index rejects inserts; the caller
    /// must rebuild from the full corpus first.
    pub fn insert(&mut self, id: u64, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension() {
            return Err(Error::dimension_mismatch(self.dimension(), vector.len()));
        }
        match self {
            Self::Exact(e) => {
                e.entries.push(IndexEntry { id, vector });
                Ok(())
            }
            Self::Approximate(a) => {
                if !a.trained {
                    return Err(Error::invariant(
                        "insert into untrained approximate index",
                    ));
                }
                let list = a.nearest_centroids(&vector, 1)[0];
                a.lists[list].push(IndexEntry { id, vector });
                Ok(())
            }
        }
    }

    /// K most similar vectors above the threshold.
    ///
    /// The query is normalized defensively; similarity is the inner product
    /// (cosine similarity for unit vectors). Results are ordered descending
    /// by similarity with ties broken by ascending id, so equal inputs
    /// always produce equal outputs. An empty index yields an empty list,
    /// not an error.
    pub fn search(&self, query: &[f32], k: usize, threshold: f32) -> Result<Vec<(u64, f32)>> {
        if query.len() != self.dimension() {
            return Err(Error::dimension_mismatch(self.dimension(), query.len()));
        }
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        vecmath::normalize(&mut query);

        let mut hits: Vec<(u64, f32)> = Vec::new();
        let mut scan = |entries: &[IndexEntry]| {
            for entry in entries {
                let similarity = vecmath::dot(&query, &entry.vector);
                if similarity >= threshold {
                    hits.push((entry.id, similarity));
                }
            }
        };

        match self {
            Self::Exact(e) => scan(&e.entries),
            Self::Approximate(a) => {
                for list in a.nearest_centroids(&query, a.probe_count) {
                    scan(&a.lists[list]);
                }
            }
        }

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

impl ApproxIndex {
    /// Train the quantizer on the full corpus and fill the inverted lists.
    fn train(&mut self, corpus: &[(u64, Vec<f32>)], iterations: usize) {
        if corpus.is_empty() {
            return;
        }
        let k = self.cluster_count.min(corpus.len());

        // Seed centroids from evenly-spaced corpus vectors.
        self.centroids = (0..k)
            .map(|i| corpus[i * corpus.len() / k].1.clone())
            .collect();

        for _ in 0..iterations {
            // Assign each vector to its nearest centroid.
            let mut members: Vec<Vec<usize>> = vec![Vec::new(); k];
            for (vi, (_, vector)) in corpus.iter().enumerate() {
                let best = self.nearest_centroids(vector, 1)[0];
                members[best].push(vi);
            }

            // Recompute centroids as normalized member means. Empty
            // clusters keep their previous centroid.
            let mut moved = false;
            for (ci, cluster) in members.iter().enumerate() {
                if cluster.is_empty() {
                    continue;
                }
                let mut mean = vec![0.0f32; self.dimension];
                for &vi in cluster {
                    for (j, val) in corpus[vi].1.iter().enumerate() {
                        mean[j] += val;
                    }
                }
                for val in &mut mean {
                    *val /= cluster.len() as f32;
                }
                vecmath::normalize(&mut mean);
                if mean != self.centroids[ci] {
                    self.centroids[ci] = mean;
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }

        // Final assignment into inverted lists.
        self.lists = vec![Vec::new(); k];
        for (id, vector) in corpus {
            let list = self.nearest_centroids(vector, 1)[0];
            self.lists[list].push(IndexEntry {
                id: *id,
                vector: vector.clone(),
            });
        }
        self.cluster_count = k;
        self.probe_count = self.probe_count.min(k);
        self.trained = true;
    }

    /// Indices of the `n` centroids nearest to the vector, by inner product.
    fn nearest_centroids(&self, vector: &[f32], n: usize) -> Vec<usize> {
        let mut scored: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, vecmath::dot(vector, c)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(n.max(1));
        scored.into_iter().map(|(i, _)| i).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
