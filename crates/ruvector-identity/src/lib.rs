//! # RuVector Identity
//!
//! Biometric identity encoding with hyperdimensional computing (HDC):
//! - Quantize, bind and bundle real-valued face features into binary hypervectors
//! - One prototype per enrolled identity, matched by Hamming similarity
//! - Continual learning by blending new observations into prototypes
//! - Compact `HDC1` model files and C headers for embedded deployment
//!
//! ## Encoder
//!
//! ```rust
//! use ruvector_identity::{EncoderConfig, HdcEncoder};
//!
//! let mut encoder = HdcEncoder::new(EncoderConfig::new(3, 2000, 32)).unwrap();
//!
//! encoder.train(&[
//!     ("alice", vec![0.5f32, -1.0, 2.0]),
//!     ("bob", vec![-2.0f32, 1.5, -0.5]),
//! ]).unwrap();
//!
//! let (who, confidence) = encoder.predict(&[0.5, -1.0, 2.0]).unwrap();
//! assert_eq!(who, "alice");
//! assert_eq!(confidence, 1.0);
//!
//! // Blend a fresh observation into the prototype
//! encoder.update_prototype("alice", &[0.6, -1.0, 2.0], 0.5).unwrap();
//!
//! // Bit-packed footprint
//! let memory = encoder.memory_usage();
//! assert_eq!(memory.bytes_per_vector, 250);
//! ```
//!
//! ## Verifier
//!
//! [`IdentityVerifier`] adds enrollment buffering, thresholds and statistics,
//! and can be shared between threads.

pub mod basis;
pub mod config;
pub mod encoder;
pub mod error;
pub mod hdc;
pub mod header;
pub mod memory;
pub mod model;
pub mod verifier;

pub use basis::HypervectorBasis;
pub use config::{EncoderConfig, VerifierConfig};
pub use encoder::{ClassPrototype, HdcEncoder};
pub use error::{IdentityError, Result};
pub use hdc::BinaryHypervector;
pub use header::{export_c_header, render_c_header};
pub use memory::{EmbeddedBudget, FootprintCheck, MemoryReport};
pub use model::{decode_model, encode_model, ModelHeader, MODEL_MAGIC};
pub use verifier::{
    EnrollmentStatus, IdentificationResult, IdentityVerifier, VerificationResult, VerifierStats,
};
