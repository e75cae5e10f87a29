//! Faceseek retrieval engine.
//!
//! Retrieves photographs containing a specific person by comparing a query
//! face embedding against a growing collection of stored face embeddings,
//! returning ranked, photo-grouped matches.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    faceseek-engine                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EmbeddingStore (append-only, tombstones, source of truth)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorIndex                                                │
//! │  ├── Exact (linear inner-product scan)                      │
//! │  └── Approximate (k-means quantizer + probed clusters)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Orchestrator (primary → expand | fallback → merged)        │
//! │  group_by_photo (per-photo match aggregation)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FaceSearchEngine facade + SessionRegistry + EngineRegistry │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The insertion path writes to the store, then the index; the query path
//! runs the multi-stage orchestrator against the index, resolves hits
//! through the store, and groups them per photo. The store is authoritative:
//! the index may be discarded and rebuilt from it at any time.
//!
//! # Example
//!
//! ```rust,ignore
//! use faceseek_core::EngineConfig;
//! use faceseek_engine::{BoundingBox, FaceMetadata, FaceSearchEngine, SearchOptions};
//!
//! let engine = FaceSearchEngine::open(EngineConfig::default())?;
//! let id = engine
//!     .insert(embedding, "photos/p1.jpg", BoundingBox::new(10, 10, 80, 80), 0.98, FaceMetadata::default())
//!     .await?;
//!
//! let groups = engine.search(query, SearchOptions::default()).await?;
//! for group in groups {
//!     println!("{}: {:.3}", group.photo, group.max_similarity);
//! }
//! ```

pub mod aggregate;
pub mod engine;
pub mod index;
pub mod persistence;
pub mod registry;
pub mod search;
pub mod session;
pub mod store;
pub mod types;

// Re-exports — core types
pub use types::{
    BoundingBox, EngineStats, FaceHit, FaceMetadata, FaceRecord, GroupedFace, MatchGroup,
    NewFace, SearchOptions,
};

// Re-exports — components
pub use aggregate::group_by_photo;
pub use engine::FaceSearchEngine;
pub use index::{IndexKind, VectorIndex};
pub use registry::EngineRegistry;
pub use search::{Orchestrator, SearchPolicy};
pub use session::{QueryLogEntry, SearchSession, SessionRegistry};
pub use store::EmbeddingStore;
