//! HDC operations: binding, bundling, bipolar blending

use super::vector::BinaryHypervector;
use crate::error::{IdentityError, Result};

/// Binds two hypervectors using XOR
///
/// Convenience function equivalent to `v1.bind(&v2)`.
#[inline]
pub fn bind(v1: &BinaryHypervector, v2: &BinaryHypervector) -> BinaryHypervector {
    v1.bind(v2)
}

/// Bundles hypervectors by majority vote (ties set the bit)
///
/// Convenience function equivalent to `BinaryHypervector::bundle(vectors)`.
pub fn bundle(vectors: &[BinaryHypervector]) -> Result<BinaryHypervector> {
    BinaryHypervector::bundle(vectors)
}

/// Streaming per-bit vote counter behind every majority bundle
///
/// Vectors are added one at a time, so encoding and training never have to
/// materialize the full set of inputs.
///
/// # Example
///
/// ```rust
/// use ruvector_identity::hdc::{BinaryHypervector, MajorityCounter};
///
/// let mut counter = MajorityCounter::new(3);
/// counter.add(&BinaryHypervector::from_bits(&[true, false, false]));
/// counter.add(&BinaryHypervector::from_bits(&[true, true, false]));
/// counter.add(&BinaryHypervector::from_bits(&[false, true, false]));
///
/// let majority = counter.finish().unwrap();
/// assert_eq!(majority, BinaryHypervector::from_bits(&[true, true, false]));
/// ```
#[derive(Debug, Clone)]
pub struct MajorityCounter {
    counts: Vec<u32>,
    total: u32,
}

impl MajorityCounter {
    /// Creates a counter for `dim`-bit vectors
    pub fn new(dim: usize) -> Self {
        Self {
            counts: vec![0u32; dim],
            total: 0,
        }
    }

    /// Adds one vote per set bit of `vector`
    pub fn add(&mut self, vector: &BinaryHypervector) {
        debug_assert_eq!(vector.dim(), self.counts.len(), "counter width mismatch");

        // Walk set bits word by word instead of testing all bits
        for (word_idx, &word) in vector.words().iter().enumerate() {
            let mut remaining = word;
            while remaining != 0 {
                let bit_pos = remaining.trailing_zeros() as usize;
                self.counts[word_idx * 64 + bit_pos] += 1;
                remaining &= remaining - 1;
            }
        }
        self.total += 1;
    }

    /// Number of vectors added so far
    #[inline]
    pub fn len(&self) -> usize {
        self.total as usize
    }

    /// True when no vector has been added
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Resolves the vote: bit set iff `2 * count >= total`
    pub fn finish(&self) -> Result<BinaryHypervector> {
        if self.total == 0 {
            return Err(IdentityError::EmptyVectorSet);
        }

        let mut result = BinaryHypervector::zeros(self.counts.len());
        for (bit, &count) in self.counts.iter().enumerate() {
            if 2 * count as u64 >= self.total as u64 {
                result.words[bit / 64] |= 1u64 << (bit % 64);
            }
        }
        Ok(result)
    }
}

/// Blends two hypervectors as a weighted bipolar average
///
/// Each bit maps to ±1, the weighted sum `(1 - alpha) * old + alpha * new`
/// is taken, and the sign becomes the new bit. A sum of exactly zero (only
/// reachable at `alpha == 0.5` where the inputs disagree) resolves to 1.
///
/// `alpha` must already be validated to lie in `[0, 1]`.
pub fn blend_bipolar(
    old: &BinaryHypervector,
    new: &BinaryHypervector,
    alpha: f32,
) -> BinaryHypervector {
    debug_assert_eq!(old.dim(), new.dim(), "blend width mismatch");

    let keep = 1.0 - alpha;
    let mut result = BinaryHypervector::zeros(old.dim());

    for (i, (o, n)) in old.iter_bits().zip(new.iter_bits()).enumerate() {
        let o = if o { 1.0f32 } else { -1.0 };
        let n = if n { 1.0f32 } else { -1.0 };
        let blended = keep * o + alpha * n;

        if blended >= 0.0 {
            result.words[i / 64] |= 1u64 << (i % 64);
        }
    }

    result
}
