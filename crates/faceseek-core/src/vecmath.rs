//! Unit-vector math for cosine similarity via inner product.
//!
//! All stored and queried embeddings are kept unit-normalized so the inner
//! product of two vectors equals their cosine similarity, avoiding a
//! per-comparison normalization step.

/// Tolerance within which a vector counts as already unit-length.
pub const UNIT_TOLERANCE: f32 = 1e-6;

/// Euclidean norm of a vector.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Inner product of two equal-length vectors.
///
/// For unit-normalized inputs this is the cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Normalize a vector to unit length in place.
///
/// A vector already within [`UNIT_TOLERANCE`] of unit length is left
/// untouched. A zero vector has no direction and is also left as-is;
/// it will never clear a positive similarity threshold.
pub fn normalize(v: &mut [f32]) {
    let n = norm(v);
    if n > 0.0 && (n - 1.0).abs() > UNIT_TOLERANCE {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
}
