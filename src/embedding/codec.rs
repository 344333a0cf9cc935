//! Embedding blob codec and cosine similarity.
//!
//! Blobs are concatenated little-endian IEEE-754 `f32`s, `4 * dim` bytes long.
//! An empty vector and an absent vector are the same thing: both encode to an
//! empty blob, which the stores persist as `NULL`.

use crate::error::{Error, Result};

pub fn encode(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn decode(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::Invalid(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity; `0.0` for empty, mismatched, or zero-norm inputs.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Indices and scores of the `k` candidates most similar to `query`, best first.
///
/// Linear scan. Candidates whose length differs from the query are skipped;
/// ties keep insertion order.
pub fn top_k<V: AsRef<[f32]>>(query: &[f32], candidates: &[V], k: usize) -> Vec<(usize, f32)> {
    if k == 0 || query.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.as_ref().len() == query.len())
        .map(|(i, c)| (i, cosine(query, c.as_ref())))
        .collect();
    // sort_by is stable, so equal scores stay in insertion order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
