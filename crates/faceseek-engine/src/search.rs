//! Multi-stage recall-expansion search.
//!
//! Face-similarity thresholds are uncertain: too strict misses hard photos
//! (side profiles, low light), too loose floods the caller with strangers.
//! The orchestrator trades precision for recall in stages:
//!
//! 1. Primary search at the strict threshold.
//! 2. If it found something but fewer than the sufficiency count, the person
//!    is evidently present — re-search at a relaxed threshold (bounded below
//!    by the floor) to pick up the difficult photos, flagging new hits as
//!    expanded.
//! 3. If it found nothing, run one deep fallback search at a fixed low
//!    threshold to maximize recall; all fallback hits are flagged expanded.
//!
//! The merged result deduplicates by id keeping the first-seen similarity
//! (the highest-precision stage's value) and sorts descending by similarity.
//! This is a heuristic policy; its contract is that it never returns fewer
//! matches than the primary stage alone, and never duplicates an id.

use faceseek_core::{EngineConfig, Result};

use crate::index::VectorIndex;
use crate::types::SearchOptions;

/// Thresholds and limits governing the staged search.
#[derive(Debug, Clone, Copy)]
pub struct SearchPolicy {
    /// Strict threshold for the primary stage.
    pub primary_threshold: f32,
    /// Raw hit limit per stage.
    pub max_results: usize,
    /// Primary hit count at or above which no relaxed stage runs.
    pub sufficiency_count: usize,
    /// Threshold reduction applied by the expand stage.
    pub expand_delta: f32,
    /// Lowest threshold the expand stage may reach.
    pub floor_threshold: f32,
    /// Fixed threshold for the fallback stage.
    pub fallback_threshold: f32,
}

impl SearchPolicy {
    /// Resolve a policy from configuration defaults and per-call options.
    pub fn resolve(config: &EngineConfig, options: SearchOptions) -> Self {
        Self {
            primary_threshold: options.threshold.unwrap_or(config.primary_threshold),
            max_results: options.k.unwrap_or(config.max_results),
            sufficiency_count: config.sufficiency_count,
            expand_delta: config.expand_delta,
            floor_threshold: config.floor_threshold,
            fallback_threshold: config.fallback_threshold,
        }
    }

    /// The relaxed threshold used by the expand stage.
    pub fn relaxed_threshold(&self) -> f32 {
        self.floor_threshold
            .max(self.primary_threshold - self.expand_delta)
    }
}

/// One deduplicated hit from the staged search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedMatch {
    /// Stored face id.
    pub id: u64,
    /// Similarity from the highest-precision stage that produced the id.
    pub similarity: f32,
    /// Whether the id first appeared in a relaxed-threshold stage.
    pub expanded: bool,
}

/// Runs the staged threshold-expansion policy against a vector index.
pub struct Orchestrator<'a> {
    index: &'a VectorIndex,
    policy: SearchPolicy,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over an index snapshot.
    pub fn new(index: &'a VectorIndex, policy: SearchPolicy) -> Self {
        Self { index, policy }
    }

    /// Run all applicable stages and return the merged, ranked hits.
    pub fn run(&self, query: &[f32]) -> Result<Vec<RankedMatch>> {
        let p = &self.policy;

        log::debug!(
            "primary search: threshold {:.2}, k {}",
            p.primary_threshold,
            p.max_results
        );
        let primary = self
            .index
            .search(query, p.max_results, p.primary_threshold)?;
        log::debug!("primary search found {} hits", primary.len());

        let mut merged: Vec<RankedMatch> = primary
            .iter()
            .map(|&(id, similarity)| RankedMatch {
                id,
                similarity,
                expanded: false,
            })
            .collect();

        if primary.is_empty() {
            // Nothing at the strict threshold: one deep dive for recall.
            log::debug!(
                "fallback search: threshold {:.2}",
                p.fallback_threshold
            );
            let fallback = self
                .index
                .search(query, p.max_results, p.fallback_threshold)?;
            log::debug!("fallback search found {} hits", fallback.len());
            merged.extend(fallback.into_iter().map(|(id, similarity)| RankedMatch {
                id,
                similarity,
                expanded: true,
            }));
        } else if primary.len() < p.sufficiency_count {
            // The person is present; relax the threshold for related photos.
            let relaxed = p.relaxed_threshold();
            log::debug!("expand search: threshold {:.2}", relaxed);
            let expanded = self.index.search(query, p.max_results, relaxed)?;

            let mut added = 0;
            for (id, similarity) in expanded {
                if merged.iter().all(|m| m.id != id) {
                    merged.push(RankedMatch {
                        id,
                        similarity,
                        expanded: true,
                    });
                    added += 1;
                }
            }
            log::debug!("expand search added {added} hits");
        }

        merged.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(merged)
    }
}

// ============================================================================
// Tests
// ============================================================================
