//! Append-only embedding store.
//!
//! The store is the authoritative record of every inserted vector and its
//! metadata, and the only component permitted to assign ids. The vector
//! index derives from it and may be discarded and rebuilt from
//! [`EmbeddingStore::all_active`] at any time without data loss.
//!
//! Deletion is logical: records are tombstoned rather than removed, because
//! positional ids must stay stable for any index built on them. Tombstones
//! are reclaimed by a compacting index rebuild.

use faceseek_core::{Error, Result, vecmath};
use serde::{Deserialize, Serialize};

use crate::types::{BoundingBox, FaceMetadata, FaceRecord, NewFace};

/// A face record together with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFace {
    /// Record fields (id, photo, bbox, confidence, metadata, tombstone).
    pub record: FaceRecord,

    /// Unit-normalized embedding vector.
    pub vector: Vec<f32>,
}

/// Durable, ordered record of all embeddings and their metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingStore {
    dimension: usize,
    faces: Vec<StoredFace>,
    next_id: u64,
    tombstones: usize,
}

impl EmbeddingStore {
    /// Create an empty store for the given embedding dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            faces: Vec::new(),
            next_id: 0,
            tombstones: 0,
        }
    }

    /// The embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// All records including tombstones.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Whether the store holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Active (non-tombstoned) records.
    pub fn active_len(&self) -> usize {
        self.faces.len() - self.tombstones
    }

    /// Tombstoned records awaiting compaction.
    pub fn tombstone_len(&self) -> usize {
        self.tombstones
    }

    /// Tombstoned fraction of the store, 0.0 for an empty store.
    pub fn tombstone_ratio(&self) -> f32 {
        if self.faces.is_empty() {
            0.0
        } else {
            self.tombstones as f32 / self.faces.len() as f32
        }
    }

    /// Append one face, returning its assigned id.
    ///
    /// Validates the vector length against the configured dimension and
    /// re-normalizes defensively (upstream producers promise near-unit
    /// vectors, the store guarantees exact ones). Never touches the index.
    pub fn append(
        &mut self,
        mut vector: Vec<f32>,
        photo: impl Into<String>,
        bbox: BoundingBox,
        confidence: f32,
        metadata: FaceMetadata,
    ) -> Result<u64> {
        if vector.len() != self.dimension {
            return Err(Error::dimension_mismatch(self.dimension, vector.len()));
        }
        vecmath::normalize(&mut vector);

        let id = self.next_id;
        self.next_id += 1;
        self.faces.push(StoredFace {
            record: FaceRecord {
                id,
                photo: photo.into(),
                bbox,
                confidence,
                metadata,
                deleted: false,
            },
            vector,
        });
        Ok(id)
    }

    /// Append a batch of faces, returning their ids in order.
    ///
    /// Dimensions are validated up front so a bad vector in the middle of
    /// the batch cannot leave a partial append behind.
    pub fn append_batch(&mut self, faces: Vec<NewFace>) -> Result<Vec<u64>> {
        for face in &faces {
            if face.vector.len() != self.dimension {
                return Err(Error::dimension_mismatch(self.dimension, face.vector.len()));
            }
        }

        let mut ids = Vec::with_capacity(faces.len());
        for face in faces {
            ids.push(self.append(
                face.vector,
                face.photo,
                face.bbox,
                face.confidence,
                face.metadata,
            )?);
        }
        Ok(ids)
    }

    /// Look up a face by id. Tombstoned records are still returned; callers
    /// that must skip them check `record.deleted`.
    pub fn get(&self, id: u64) -> Option<&StoredFace> {
        // Ids are assigned in strictly increasing order, so the vec is sorted.
        self.faces
            .binary_search_by_key(&id, |f| f.record.id)
            .ok()
            .map(|i| &self.faces[i])
    }

    /// Tombstone every record owned by the given photo; returns the count.
    pub fn remove_by_photo(&mut self, photo: &str) -> usize {
        let mut count = 0;
        for face in &mut self.faces {
            if !face.record.deleted && face.record.photo == photo {
                face.record.deleted = true;
                count += 1;
            }
        }
        self.tombstones += count;
        count
    }

    /// All active records, in id order. Used to (re)build the vector index
    /// from the full corpus.
    pub fn all_active(&self) -> impl Iterator<Item = (u64, &[f32], &FaceRecord)> {
        self.faces.iter().filter(|f| !f.record.deleted).map(|f| {
            (f.record.id, f.vector.as_slice(), &f.record)
        })
    }

    /// Clear all records. Only used on explicit full reset; ids restart.
    pub fn reset(&mut self) {
        self.faces.clear();
        self.next_id = 0;
        self.tombstones = 0;
    }

    /// Validate internal consistency after deserialization.
    ///
    /// A snapshot that fails these checks must be treated as corrupt, not
    /// partially usable.
    pub fn validate(&self, expected_dimension: usize) -> Result<()> {
        if self.dimension != expected_dimension {
            return Err(Error::corrupt_store(format!(
                "snapshot dimension {} does not match configured {}",
                self.dimension, expected_dimension
            )));
        }
        let mut prev: Option<u64> = None;
        let mut tombstones = 0;
        for face in &self.faces {
            if face.vector.len() != self.dimension {
                return Err(Error::corrupt_store(format!(
                    "record {} has vector length {}",
                    face.record.id,
                    face.vector.len()
                )));
            }
            if let Some(p) = prev {
                if face.record.id <= p {
                    return Err(Error::corrupt_store("record ids are not increasing"));
                }
            }
            prev = Some(face.record.id);
            if face.record.deleted {
                tombstones += 1;
            }
        }
        if tombstones != self.tombstones {
            return Err(Error::corrupt_store("tombstone count drift"));
        }
        if let Some(last) = prev {
            if self.next_id <= last {
                return Err(Error::corrupt_store("next_id would reuse an id"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox::new(0, 0, 64, 64)
    }

    fn store4() -> EmbeddingStore {
        EmbeddingStore::new(4)
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let mut store = store4();
        let a = store
            .append(vec![1.0, 0.0, 0.0, 0.0], "a.jpg", bbox(), 0.9, FaceMetadata::default())
            .unwrap();
        let b = store
            .append(vec![0.0, 1.0, 0.0, 0.0], "b.jpg", bbox(), 0.9, FaceMetadata::default())
            .unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(store.len(), 2);
        assert_eq!(store.active_len(), 2);
    }

    #[test]
    fn test_append_rejects_wrong_dimension() {
        let mut store = store4();
        let err = store
            .append(vec![1.0, 0.0], "a.jpg", bbox(), 0.9, FaceMetadata::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch { expected: 4, actual: 2 }
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_append_normalizes_vector() {
        let mut store = store4();
        let id = store
            .append(vec![3.0, 4.0, 0.0, 0.0], "a.jpg", bbox(), 0.9, FaceMetadata::default())
            .unwrap();
        let stored = store.get(id).unwrap();
        assert!((vecmath::norm(&stored.vector) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_append_batch_all_or_nothing() {
        let mut store = store4();
        let faces = vec![
            NewFace::new(vec![1.0, 0.0, 0.0, 0.0], "a.jpg", bbox(), 0.9),
            NewFace::new(vec![1.0, 0.0], "a.jpg", bbox(), 0.9), // wrong dimension
        ];
        assert!(store.append_batch(faces).is_err());
        assert!(store.is_empty());

        let faces = vec![
            NewFace::new(vec![1.0, 0.0, 0.0, 0.0], "a.jpg", bbox(), 0.9),
            NewFace::new(vec![0.0, 1.0, 0.0, 0.0], "b.jpg", bbox(), 0.9),
        ];
        let ids = store.append_batch(faces).unwrap();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_remove_by_photo_tombstones_only() {
        let mut store = store4();
        for photo in ["p1.jpg", "p1.jpg", "p2.jpg"] {
            store
                .append(vec![1.0, 0.0, 0.0, 0.0], photo, bbox(), 0.9, FaceMetadata::default())
                .unwrap();
        }

        let removed = store.remove_by_photo("p1.jpg");
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 3);
        assert_eq!(store.active_len(), 1);
        assert_eq!(store.tombstone_len(), 2);

        // Repeat delete finds nothing new
        assert_eq!(store.remove_by_photo("p1.jpg"), 0);

        // Ids stay stable and tombstoned records remain addressable
        assert!(store.get(0).unwrap().record.deleted);
        assert!(!store.get(2).unwrap().record.deleted);
    }

    #[test]
    fn test_all_active_excludes_tombstones() {
        let mut store = store4();
        for photo in ["p1.jpg", "p2.jpg", "p1.jpg"] {
            store
                .append(vec![0.0, 0.0, 1.0, 0.0], photo, bbox(), 0.9, FaceMetadata::default())
                .unwrap();
        }
        store.remove_by_photo("p1.jpg");

        let active: Vec<u64> = store.all_active().map(|(id, _, _)| id).collect();
        assert_eq!(active, vec![1]);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut store = store4();
        store
            .append(vec![1.0, 0.0, 0.0, 0.0], "p1.jpg", bbox(), 0.9, FaceMetadata::default())
            .unwrap();
        store.remove_by_photo("p1.jpg");
        let id = store
            .append(vec![0.0, 1.0, 0.0, 0.0], "p2.jpg", bbox(), 0.9, FaceMetadata::default())
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_tombstone_ratio() {
        let mut store = store4();
        assert_eq!(store.tombstone_ratio(), 0.0);
        for photo in ["p1.jpg", "p2.jpg", "p3.jpg", "p4.jpg"] {
            store
                .append(vec![1.0, 0.0, 0.0, 0.0], photo, bbox(), 0.9, FaceMetadata::default())
                .unwrap();
        }
        store.remove_by_photo("p1.jpg");
        assert!((store.tombstone_ratio() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = store4();
        store
            .append(vec![1.0, 0.0, 0.0, 0.0], "p1.jpg", bbox(), 0.9, FaceMetadata::default())
            .unwrap();
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.tombstone_len(), 0);

        // After a full reset id assignment restarts
        let id = store
            .append(vec![1.0, 0.0, 0.0, 0.0], "p1.jpg", bbox(), 0.9, FaceMetadata::default())
            .unwrap();
        assert_eq!(id, 0);
    }

    #[test]
    fn test_validate_roundtrip() {
        let mut store = store4();
        store
            .append(vec![1.0, 0.0, 0.0, 0.0], "p1.jpg", bbox(), 0.9, FaceMetadata::default())
            .unwrap();
        store.remove_by_photo("p1.jpg");

        let json = serde_json::to_string(&store).unwrap();
        let loaded: EmbeddingStore = serde_json::from_str(&json).unwrap();
        assert!(loaded.validate(4).is_ok());
        assert!(loaded.validate(8).is_err());
    }

    #[test]
    fn test_validate_detects_id_reuse() {
        let mut store = store4();
        store
            .append(vec![1.0, 0.0, 0.0, 0.0], "p1.jpg", bbox(), 0.9, FaceMetadata::default())
            .unwrap();
        let mut json: serde_json::Value = serde_json::to_value(&store).unwrap();
        json["next_id"] = serde_json::json!(0);
        let tampered: EmbeddingStore = serde_json::from_value(json).unwrap();
        assert!(tampered.validate(4).is_err());
    }
}
