//! Hyperdimensional Computing (HDC) primitives
//!
//! Dynamic-width binary hypervectors packed into u64 words, with XOR
//! binding, majority bundling and Hamming similarity.

mod ops;
mod similarity;
mod vector;

pub use ops::{bind, blend_bipolar, bundle, MajorityCounter};
pub use similarity::{
    batch_similarities, best_match, hamming_distance, normalized_hamming, top_k_similar,
};
pub use vector::BinaryHypervector;
