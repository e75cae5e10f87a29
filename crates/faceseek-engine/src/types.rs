//! Common types for the retrieval engine.
//!
//! These types are shared across the store, index, orchestrator, and
//! aggregation modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Faces and records
// ============================================================================

/// Face bounding box within the source image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    /// Create a bounding box from `(x, y, width, height)`.
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }
}

/// Metadata attached to a face at insertion time.
///
/// A closed, versioned schema rather than an open key-value map: downstream
/// grouping and filtering depend on these fields, and the closed form makes
/// that dependency checkable at compile time. All fields are optional with
/// serde defaults so older snapshots keep deserializing as the schema grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceMetadata {
    /// Capture timestamp, typically from EXIF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,

    /// Human-readable location name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Event label the photo belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl FaceMetadata {
    /// Set the capture timestamp.
    pub fn with_captured_at(mut self, ts: DateTime<Utc>) -> Self {
        self.captured_at = Some(ts);
        self
    }

    /// Set the location name.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the event label.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }
}

/// A stored face: one detected face in one photo.
///
/// Records are immutable after insertion except for the tombstone flag,
/// which marks logical deletion while keeping positional ids stable for
/// any index built on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRecord {
    /// Stable id, assigned at insertion time in strictly increasing order.
    pub id: u64,

    /// Identifier of the owning photo (path or opaque key).
    pub photo: String,

    /// Face bounding box within the photo.
    pub bbox: BoundingBox,

    /// Detector confidence for this face.
    pub confidence: f32,

    /// Insertion-time metadata.
    #[serde(default)]
    pub metadata: FaceMetadata,

    /// Tombstone flag: logically deleted, excluded from rebuilds and results.
    #[serde(default)]
    pub deleted: bool,
}

/// Input for a single face insertion.
#[derive(Debug, Clone)]
pub struct NewFace {
    /// Embedding vector (re-normalized defensively on append).
    pub vector: Vec<f32>,
    /// Owning photo identifier.
    pub photo: String,
    /// Face bounding box.
    pub bbox: BoundingBox,
    /// Detector confidence.
    pub confidence: f32,
    /// Insertion-time metadata.
    pub metadata: FaceMetadata,
}

impl NewFace {
    /// Create a new face input with default metadata.
    pub fn new(
        vector: Vec<f32>,
        photo: impl Into<String>,
        bbox: BoundingBox,
        confidence: f32,
    ) -> Self {
        Self {
            vector,
            photo: photo.into(),
            bbox,
            confidence,
            metadata: FaceMetadata::default(),
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: FaceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// ============================================================================
// Search types
// ============================================================================

/// Options for a search request. Unset fields fall back to configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum raw face hits per search stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,

    /// Similarity threshold for the first stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

impl SearchOptions {
    /// Set the per-stage result limit.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    /// Set the primary threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// A per-face hit resolved against the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceHit {
    /// Stored face id.
    pub id: u64,

    /// Owning photo identifier.
    pub photo: String,

    /// Face bounding box within the photo.
    pub bbox: BoundingBox,

    /// Cosine similarity to the query (-1.0 to 1.0, higher is closer).
    pub similarity: f32,

    /// Whether this hit came from a relaxed-threshold stage.
    #[serde(default)]
    pub expanded: bool,
}

/// One matched face within a [`MatchGroup`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedFace {
    /// Face bounding box within the photo.
    pub bbox: BoundingBox,

    /// Cosine similarity to the query.
    pub similarity: f32,
}

/// All matched faces of one photo, with aggregate scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchGroup {
    /// Photo identifier.
    pub photo: String,

    /// Matched faces, in the order the hits arrived (similarity-ranked).
    pub faces: Vec<GroupedFace>,

    /// Highest per-face similarity in the group.
    pub max_similarity: f32,

    /// Mean per-face similarity in the group.
    pub avg_similarity: f32,

    /// Number of matched faces in the photo.
    pub face_count: usize,

    /// Whether any grouped hit came from a relaxed-threshold stage.
    #[serde(default)]
    pub expanded: bool,
}

// ============================================================================
// Statistics
// ============================================================================

/// Engine statistics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    /// Active (non-tombstoned) records.
    pub total_active: usize,

    /// All records including tombstones.
    pub total_records: usize,

    /// Tombstoned records awaiting compaction.
    pub tombstones: usize,

    /// Current index kind description.
    pub index_kind: String,

    /// Embedding dimension.
    pub dimension: usize,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_roundtrip() {
        let bbox = BoundingBox::new(10, 20, 100, 120);
        let json = serde_json::to_string(&bbox).unwrap();
        let back: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(bbox, back);
    }

    #[test]
    fn test_metadata_builder() {
        let meta = FaceMetadata::default()
            .with_location("Lisbon")
            .with_event("wedding");

        assert_eq!(meta.location.as_deref(), Some("Lisbon"));
        assert_eq!(meta.event.as_deref(), Some("wedding"));
        assert!(meta.captured_at.is_none());
    }

    #[test]
    fn test_metadata_serialization_skips_empty() {
        let json = serde_json::to_string(&FaceMetadata::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_metadata_deserializes_unknown_absent_fields() {
        // Forward compatibility: an older snapshot without newer fields
        let meta: FaceMetadata = serde_json::from_str(r#"{"location":"Rome"}"#).unwrap();
        assert_eq!(meta.location.as_deref(), Some("Rome"));
        assert!(meta.event.is_none());
    }

    #[test]
    fn test_face_record_deleted_defaults_false() {
        let json = r#"{
            "id": 7,
            "photo": "p.jpg",
            "bbox": {"x":0,"y":0,"w":10,"h":10},
            "confidence": 0.9
        }"#;
        let record: FaceRecord = serde_json::from_str(json).unwrap();
        assert!(!record.deleted);
        assert_eq!(record.id, 7);
    }

    #[test]
    fn test_search_options_builder() {
        let opts = SearchOptions::default().with_k(25).with_threshold(0.6);
        assert_eq!(opts.k, Some(25));
        assert_eq!(opts.threshold, Some(0.6));

        let json = serde_json::to_string(&SearchOptions::default()).unwrap();
        assert!(!json.contains("threshold"));
    }

    #[test]
    fn test_new_face_with_metadata() {
        let face = NewFace::new(vec![0.0; 4], "p.jpg", BoundingBox::new(0, 0, 1, 1), 0.8)
            .with_metadata(FaceMetadata::default().with_event("party"));
        assert_eq!(face.metadata.event.as_deref(), Some("party"));
    }
}
