//! Basis and level hypervector generation
//!
//! Each feature index owns a random *basis* hypervector; each quantization
//! level owns a *level* hypervector. Levels form a continuous code: level 0
//! is random and every following level flips a fresh, disjoint block of
//! bits, so nearby levels stay similar while the two ends of the scale are
//! close to orthogonal.
//!
//! All randomness comes from one explicitly seeded [`StdRng`] that is
//! threaded through the generators, basis first and levels second.

use crate::error::{IdentityError, Result};
use crate::hdc::BinaryHypervector;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Generates `input_dim` independent random hypervectors of `hv_dim` bits
pub fn generate_basis<R: Rng + ?Sized>(
    input_dim: usize,
    hv_dim: usize,
    rng: &mut R,
) -> Result<Vec<BinaryHypervector>> {
    if input_dim == 0 || hv_dim == 0 {
        return Err(IdentityError::InvalidConfig(format!(
            "basis dimensions must be positive, got input_dim={} hv_dim={}",
            input_dim, hv_dim
        )));
    }

    Ok((0..input_dim)
        .map(|_| BinaryHypervector::random(hv_dim, rng))
        .collect())
}

/// Largest share of bits, in percent, that one level step may flip
pub const MAX_STEP_PERCENT: usize = 15;

/// Bits flipped between two adjacent levels
///
/// Spreads half of the vector over the whole scale, capped at
/// [`MAX_STEP_PERCENT`] of `hv_dim` so adjacent levels keep at least 85% of
/// their bits in common, with at least one flip per step. Below roughly 7
/// bits that single flip already exceeds the cap.
pub fn flips_per_level(levels: usize, hv_dim: usize) -> usize {
    if levels <= 1 {
        return 0;
    }
    (hv_dim / (2 * (levels - 1)))
        .min(hv_dim * MAX_STEP_PERCENT / 100)
        .max(1)
}

/// Generates `levels` hypervectors where adjacent levels differ by
/// [`flips_per_level`] bits
///
/// Flip positions are taken in order from one random permutation of the bit
/// indices, so no bit flips twice and the distance between two levels grows
/// with their index gap. Steps beyond the end of the permutation flip
/// nothing.
pub fn generate_levels<R: Rng + ?Sized>(
    levels: usize,
    hv_dim: usize,
    rng: &mut R,
) -> Result<Vec<BinaryHypervector>> {
    if levels == 0 || hv_dim == 0 {
        return Err(IdentityError::InvalidConfig(format!(
            "level dimensions must be positive, got levels={} hv_dim={}",
            levels, hv_dim
        )));
    }

    let step = flips_per_level(levels, hv_dim);
    let mut order: Vec<usize> = (0..hv_dim).collect();
    order.shuffle(rng);

    let mut current = BinaryHypervector::random(hv_dim, rng);
    let mut out = Vec::with_capacity(levels);
    out.push(current.clone());

    for k in 1..levels {
        let start = ((k - 1) * step).min(hv_dim);
        let end = (k * step).min(hv_dim);
        for &pos in &order[start..end] {
            current.flip(pos);
        }
        out.push(current.clone());
    }

    Ok(out)
}

/// The immutable projection basis of an encoder
///
/// Read-only after construction, so it can be shared freely between threads.
///
/// # Example
///
/// ```rust
/// use ruvector_identity::HypervectorBasis;
///
/// let basis = HypervectorBasis::generate(27, 1000, 50, 42).unwrap();
/// assert_eq!(basis.input_dim(), 27);
/// assert_eq!(basis.num_levels(), 50);
/// assert!(basis.level(0).similarity(basis.level(1)) > 0.85);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HypervectorBasis {
    basis: Vec<BinaryHypervector>,
    levels: Vec<BinaryHypervector>,
    hv_dim: usize,
}

impl HypervectorBasis {
    /// Generates basis and level vectors from `seed`
    pub fn generate(input_dim: usize, hv_dim: usize, levels: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let basis = generate_basis(input_dim, hv_dim, &mut rng)?;
        let levels = generate_levels(levels, hv_dim, &mut rng)?;

        Ok(Self {
            basis,
            levels,
            hv_dim,
        })
    }

    /// Rebuilds a basis from stored vectors
    ///
    /// Both sets must be non-empty and every vector must share one width.
    pub fn from_parts(basis: Vec<BinaryHypervector>, levels: Vec<BinaryHypervector>) -> Result<Self> {
        let hv_dim = match basis.first() {
            Some(first) => first.dim(),
            None => {
                return Err(IdentityError::InvalidConfig(
                    "basis set is empty".to_string(),
                ))
            }
        };
        if levels.is_empty() {
            return Err(IdentityError::InvalidConfig(
                "level set is empty".to_string(),
            ));
        }
        if hv_dim == 0 {
            return Err(IdentityError::InvalidConfig(
                "hv_dim must be greater than 0".to_string(),
            ));
        }

        if let Some(bad) = basis.iter().chain(levels.iter()).find(|v| v.dim() != hv_dim) {
            return Err(IdentityError::DimensionMismatch {
                expected: hv_dim,
                actual: bad.dim(),
            });
        }

        Ok(Self {
            basis,
            levels,
            hv_dim,
        })
    }

    /// Width of every vector in bits
    #[inline]
    pub fn hv_dim(&self) -> usize {
        self.hv_dim
    }

    /// Number of basis vectors (one per feature)
    #[inline]
    pub fn input_dim(&self) -> usize {
        self.basis.len()
    }

    /// Number of level vectors
    #[inline]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Basis vector of feature `index`
    #[inline]
    pub fn feature(&self, index: usize) -> &BinaryHypervector {
        &self.basis[index]
    }

    /// Level vector `index`
    #[inline]
    pub fn level(&self, index: usize) -> &BinaryHypervector {
        &self.levels[index]
    }

    /// All basis vectors in feature order
    pub fn basis_vectors(&self) -> &[BinaryHypervector] {
        &self.basis
    }

    /// All level vectors in level order
    pub fn level_vectors(&self) -> &[BinaryHypervector] {
        &self.levels
    }
}
