//! Binary hypervector data type and basic operations

use crate::error::{IdentityError, Result};
use rand::Rng;
use std::fmt;

/// A binary hypervector of arbitrary width, packed into u64 words
///
/// Bit `i` lives in word `i / 64` at position `i % 64`. Bits past `dim` in
/// the last word are always zero, so word-level popcounts never need
/// masking.
///
/// # Example
///
/// ```rust
/// use ruvector_identity::hdc::BinaryHypervector;
///
/// let a = BinaryHypervector::from_seed(1000, 1);
/// let b = BinaryHypervector::from_seed(1000, 2);
/// let bound = a.bind(&b);
/// assert_eq!(bound.bind(&b), a);
/// assert_eq!(a.similarity(&a), 1.0);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BinaryHypervector {
    pub(crate) words: Vec<u64>,
    dim: usize,
}

impl BinaryHypervector {
    /// Creates a hypervector of `dim` bits, all zero
    pub fn zeros(dim: usize) -> Self {
        Self {
            words: vec![0u64; dim.div_ceil(64)],
            dim,
        }
    }

    /// Creates a hypervector with every bit drawn from `rng` with p = 0.5
    pub fn random<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> Self {
        let mut hv = Self::zeros(dim);
        for word in hv.words.iter_mut() {
            *word = rng.gen();
        }
        hv.clear_tail();
        hv
    }

    /// Creates a random hypervector from a seed for reproducibility
    ///
    /// # Example
    ///
    /// ```rust
    /// use ruvector_identity::hdc::BinaryHypervector;
    ///
    /// let v1 = BinaryHypervector::from_seed(512, 42);
    /// let v2 = BinaryHypervector::from_seed(512, 42);
    /// assert_eq!(v1, v2);
    /// ```
    pub fn from_seed(dim: usize, seed: u64) -> Self {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        Self::random(dim, &mut rng)
    }

    /// Builds a hypervector from individual bits
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut hv = Self::zeros(bits.len());
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                hv.words[i / 64] |= 1u64 << (i % 64);
            }
        }
        hv
    }

    /// Width in bits
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Reads bit `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= dim`.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.dim, "bit {} out of range {}", index, self.dim);
        (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Writes bit `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= dim`.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.dim, "bit {} out of range {}", index, self.dim);
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    /// Inverts bit `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= dim`.
    #[inline]
    pub fn flip(&mut self, index: usize) {
        assert!(index < self.dim, "bit {} out of range {}", index, self.dim);
        self.words[index / 64] ^= 1u64 << (index % 64);
    }

    /// Iterates over all bits in index order
    pub fn iter_bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.dim).map(move |i| (self.words[i / 64] >> (i % 64)) & 1 == 1)
    }

    /// Binds two hypervectors using XOR
    ///
    /// Binding is commutative and self-inverse. Both operands must share the
    /// same width.
    #[inline]
    pub fn bind(&self, other: &Self) -> Self {
        debug_assert_eq!(self.dim, other.dim, "bind width mismatch");

        let words = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| a ^ b)
            .collect();

        Self {
            words,
            dim: self.dim,
        }
    }

    /// Computes Hamming distance (number of differing bits)
    #[inline]
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        debug_assert_eq!(self.dim, other.dim, "hamming width mismatch");

        // Four accumulators keep the popcounts independent
        let mut d0 = 0u32;
        let mut d1 = 0u32;
        let mut d2 = 0u32;
        let mut d3 = 0u32;

        let a = &self.words;
        let b = &other.words;
        let len = a.len().min(b.len());
        let chunks = len / 4;

        for i in 0..chunks {
            let base = i * 4;
            d0 += (a[base] ^ b[base]).count_ones();
            d1 += (a[base + 1] ^ b[base + 1]).count_ones();
            d2 += (a[base + 2] ^ b[base + 2]).count_ones();
            d3 += (a[base + 3] ^ b[base + 3]).count_ones();
        }

        for i in (chunks * 4)..len {
            d0 += (a[i] ^ b[i]).count_ones();
        }

        d0 + d1 + d2 + d3
    }

    /// Normalized Hamming similarity in `[0.0, 1.0]`
    ///
    /// `1 - hamming_distance / dim`: 1.0 for identical vectors, about 0.5
    /// for unrelated ones, 0.0 for complements.
    #[inline]
    pub fn similarity(&self, other: &Self) -> f32 {
        if self.dim == 0 {
            return 1.0;
        }
        let hamming = self.hamming_distance(other);
        (1.0 - hamming as f64 / self.dim as f64) as f32
    }

    /// Counts the number of set bits
    #[inline]
    pub fn popcount(&self) -> u32 {
        self.words.iter().map(|&w| w.count_ones()).sum()
    }

    /// Bundles vectors by per-bit majority vote
    ///
    /// Bit `j` is set when at least half of the inputs have it set, so an
    /// exact tie (only possible for an even count) resolves to 1.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ruvector_identity::hdc::BinaryHypervector;
    ///
    /// let ones = BinaryHypervector::from_bits(&[true, true, false]);
    /// let zeros = BinaryHypervector::from_bits(&[false, true, false]);
    /// let bundled = BinaryHypervector::bundle(&[ones, zeros]).unwrap();
    /// assert_eq!(bundled, BinaryHypervector::from_bits(&[true, true, false]));
    /// ```
    pub fn bundle(vectors: &[Self]) -> Result<Self> {
        let first = vectors.first().ok_or(IdentityError::EmptyVectorSet)?;

        if vectors.len() == 1 {
            return Ok(first.clone());
        }

        let mut counter = super::ops::MajorityCounter::new(first.dim);
        for vector in vectors {
            counter.add(vector);
        }
        counter.finish()
    }

    /// Packs bits MSB-first into bytes; the last byte is zero-padded
    ///
    /// Bit 0 becomes the high bit of byte 0, matching the model file layout.
    pub fn to_packed_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.dim.div_ceil(8)];
        for (i, bit) in self.iter_bits().enumerate() {
            if bit {
                bytes[i / 8] |= 0x80 >> (i % 8);
            }
        }
        bytes
    }

    /// Unpacks an MSB-first byte string produced by [`to_packed_bytes`]
    ///
    /// Padding bits past `dim` are ignored.
    ///
    /// [`to_packed_bytes`]: BinaryHypervector::to_packed_bytes
    pub fn from_packed_bytes(dim: usize, bytes: &[u8]) -> Result<Self> {
        let expected = dim.div_ceil(8);
        if bytes.len() != expected {
            return Err(IdentityError::DimensionMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let mut hv = Self::zeros(dim);
        for i in 0..dim {
            if bytes[i / 8] & (0x80 >> (i % 8)) != 0 {
                hv.words[i / 64] |= 1u64 << (i % 64);
            }
        }
        Ok(hv)
    }

    /// Packs bits MSB-first into 32-bit words for embedded targets
    ///
    /// Word `k` holds bits `32k..32k+32`, bit `32k` in the most significant
    /// position. The last word is zero-padded.
    pub fn to_words_u32(&self) -> Vec<u32> {
        let bytes = self.to_packed_bytes();
        bytes
            .chunks(4)
            .map(|chunk| {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                u32::from_be_bytes(word)
            })
            .collect()
    }

    /// Returns the internal word storage
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    fn clear_tail(&mut self) {
        let rem = self.dim % 64;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }
}

impl fmt::Debug for BinaryHypervector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BinaryHypervector {{ bits: {} set / {} total }}",
            self.popcount(),
            self.dim
        )
    }
}
