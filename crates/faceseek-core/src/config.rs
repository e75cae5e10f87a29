//! Engine configuration.
//!
//! All fields have serde defaults so a partial configuration file (or none
//! at all) yields a working engine. The defaults match the reference
//! deployment: 1024-dimensional embeddings, flat scan up to 1000 vectors,
//! and the multi-stage search thresholds tuned for event-photo recall.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a face search engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Embedding dimension. Every stored and queried vector must match.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Active-record count above which the index switches from an exact
    /// linear scan to a clustered approximate index.
    #[serde(default = "default_exact_index_limit")]
    pub exact_index_limit: usize,

    /// Number of clusters probed per approximate query.
    #[serde(default = "default_probe_count")]
    pub probe_count: usize,

    /// Lloyd iterations when training the clustering quantizer.
    #[serde(default = "default_kmeans_iterations")]
    pub kmeans_iterations: usize,

    /// Default similarity threshold for the first search stage.
    #[serde(default = "default_primary_threshold")]
    pub primary_threshold: f32,

    /// Default maximum raw face hits per search stage.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Primary-stage hit count at or above which no relaxed stage runs.
    #[serde(default = "default_sufficiency_count")]
    pub sufficiency_count: usize,

    /// Threshold reduction applied by the expand stage.
    #[serde(default = "default_expand_delta")]
    pub expand_delta: f32,

    /// Lowest threshold the expand stage may relax to.
    #[serde(default = "default_floor_threshold")]
    pub floor_threshold: f32,

    /// Fixed threshold for the deep fallback stage (primary found nothing).
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: f32,

    /// Tombstoned fraction of the store that triggers a compacting rebuild.
    #[serde(default = "default_compaction_ratio")]
    pub compaction_ratio: f32,

    /// Idle seconds after which a search session expires.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// Directory for persisted snapshots. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
}

fn default_dimension() -> usize {
    1024
}

fn default_exact_index_limit() -> usize {
    1000
}

fn default_probe_count() -> usize {
    10
}

fn default_kmeans_iterations() -> usize {
    10
}

fn default_primary_threshold() -> f32 {
    0.55
}

fn default_max_results() -> usize {
    100
}

fn default_sufficiency_count() -> usize {
    8
}

fn default_expand_delta() -> f32 {
    0.10
}

fn default_floor_threshold() -> f32 {
    0.42
}

fn default_fallback_threshold() -> f32 {
    0.30
}

fn default_compaction_ratio() -> f32 {
    0.25
}

fn default_session_idle_secs() -> u64 {
    1800
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            exact_index_limit: default_exact_index_limit(),
            probe_count: default_probe_count(),
            kmeans_iterations: default_kmeans_iterations(),
            primary_threshold: default_primary_threshold(),
            max_results: default_max_results(),
            sufficiency_count: default_sufficiency_count(),
            expand_delta: default_expand_delta(),
            floor_threshold: default_floor_threshold(),
            fallback_threshold: default_fallback_threshold(),
            compaction_ratio: default_compaction_ratio(),
            session_idle_secs: default_session_idle_secs(),
            data_dir: None,
        }
    }
}

impl EngineConfig {
    /// A configuration for tests: small dimension, in-memory, tiny index
    /// switchover so approximate paths are reachable with few vectors.
    pub fn for_testing(dimension: usize) -> Self {
        Self {
            dimension,
            exact_index_limit: 8,
            probe_count: 2,
            ..Default::default()
        }
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> crate::Result<()> {
        if self.dimension == 0 {
            return Err(crate::Error::config("dimension must be positive"));
        }
        if self.probe_count == 0 {
            return Err(crate::Error::config("probe_count must be positive"));
        }
        if !(0.0..=1.0).contains(&self.compaction_ratio) {
            return Err(crate::Error::config(
                "compaction_ratio must be within [0, 1]",
            ));
        }
        Ok(())
    }
}
