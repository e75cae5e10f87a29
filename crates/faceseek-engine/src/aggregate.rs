//! Per-photo match aggregation.
//!
//! Converts a flat, deduplicated list of per-face hits into per-photo
//! groups with aggregate scores. Pure function of its input: no side
//! effects, deterministic output ordering.

use std::collections::HashMap;

use crate::types::{FaceHit, GroupedFace, MatchGroup};

/// Group per-face hits by owning photo.
///
/// Each group carries the max and mean similarity over its faces and an
/// `expanded` flag set when any grouped hit came from a relaxed-threshold
/// stage. Groups are sorted descending by max similarity, ties broken by
/// descending average similarity, then ascending photo identifier.
pub fn group_by_photo(hits: &[FaceHit]) -> Vec<MatchGroup> {
    let mut by_photo: HashMap<&str, MatchGroup> = HashMap::new();

    for hit in hits {
        let group = by_photo
            .entry(hit.photo.as_str())
            .or_insert_with(|| MatchGroup {
                photo: hit.photo.clone(),
                faces: Vec::new(),
                // Similarity spans [-1, 1]; a zero floor would overstate
                // all-negative groups.
                max_similarity: f32::NEG_INFINITY,
                avg_similarity: 0.0,
                face_count: 0,
                expanded: false,
            });

        group.faces.push(GroupedFace {
            bbox: hit.bbox,
            similarity: hit.similarity,
        });
        if hit.similarity > group.max_similarity {
            group.max_similarity = hit.similarity;
        }
        group.expanded |= hit.expanded;
    }

    let mut groups: Vec<MatchGroup> = by_photo
        .into_values()
        .map(|mut group| {
            let sum: f32 = group.faces.iter().map(|f| f.similarity).sum();
            group.face_count = group.faces.len();
            group.avg_similarity = sum / group.face_count as f32;
            group
        })
        .collect();

    groups.sort_by(|a, b| {
        b.max_similarity
            .partial_cmp(&a.max_similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.avg_similarity
                    .partial_cmp(&a.avg_similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.photo.cmp(&b.photo))
    });
    groups
}

// ============================================================================
// Tests
// ============================================================================
