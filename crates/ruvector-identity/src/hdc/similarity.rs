//! Similarity and distance metrics for hypervectors

use super::vector::BinaryHypervector;

/// Computes Hamming distance between two hypervectors
///
/// # Example
///
/// ```rust
/// use ruvector_identity::hdc::{hamming_distance, BinaryHypervector};
///
/// let a = BinaryHypervector::from_seed(1000, 1);
/// assert_eq!(hamming_distance(&a, &a), 0);
/// ```
#[inline]
pub fn hamming_distance(v1: &BinaryHypervector, v2: &BinaryHypervector) -> u32 {
    v1.hamming_distance(v2)
}

/// Computes normalized Hamming similarity `1 - hamming / dim` in `[0.0, 1.0]`
#[inline]
pub fn normalized_hamming(v1: &BinaryHypervector, v2: &BinaryHypervector) -> f32 {
    v1.similarity(v2)
}

/// Computes similarities of a query against all candidates, in order
///
/// # Example
///
/// ```rust
/// use ruvector_identity::hdc::{batch_similarities, BinaryHypervector};
///
/// let query = BinaryHypervector::from_seed(256, 0);
/// let candidates: Vec<_> = (0..10).map(|i| BinaryHypervector::from_seed(256, i)).collect();
///
/// let sims = batch_similarities(&query, candidates.iter());
/// assert_eq!(sims.len(), 10);
/// assert_eq!(sims[0], 1.0);
/// ```
pub fn batch_similarities<'a, I>(query: &BinaryHypervector, candidates: I) -> Vec<f32>
where
    I: IntoIterator<Item = &'a BinaryHypervector>,
{
    candidates
        .into_iter()
        .map(|candidate| query.similarity(candidate))
        .collect()
}

/// Returns the index and similarity of the best candidate
///
/// Equal similarities resolve to the earliest candidate. `None` when there
/// are no candidates.
pub fn best_match<'a, I>(query: &BinaryHypervector, candidates: I) -> Option<(usize, f32)>
where
    I: IntoIterator<Item = &'a BinaryHypervector>,
{
    let mut best: Option<(usize, u32)> = None;

    // Compare integer distances so ties are exact
    for (idx, candidate) in candidates.into_iter().enumerate() {
        let dist = query.hamming_distance(candidate);
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((idx, dist)),
        }
    }

    best.map(|(idx, dist)| {
        let sim = if query.dim() == 0 {
            1.0
        } else {
            (1.0 - dist as f64 / query.dim() as f64) as f32
        };
        (idx, sim)
    })
}

/// Finds the k most similar candidates
///
/// Returns `(index, similarity)` pairs sorted by similarity descending. The
/// sort is stable, so tied candidates keep their input order.
pub fn top_k_similar<'a, I>(query: &BinaryHypervector, candidates: I, k: usize) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = &'a BinaryHypervector>,
{
    let mut similarities: Vec<_> = candidates
        .into_iter()
        .enumerate()
        .map(|(idx, candidate)| (idx, query.hamming_distance(candidate)))
        .collect();

    similarities.sort_by_key(|&(_, dist)| dist);

    similarities
        .into_iter()
        .take(k)
        .map(|(idx, dist)| {
            let sim = if query.dim() == 0 {
                1.0
            } else {
                (1.0 - dist as f64 / query.dim() as f64) as f32
            };
            (idx, sim)
        })
        .collect()
}
