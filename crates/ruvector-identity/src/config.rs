//! Encoder and verifier configuration

use crate::error::{IdentityError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shape and quantization parameters of an [`HdcEncoder`](crate::HdcEncoder)
///
/// Immutable once an encoder has been built from it.
///
/// # Example
///
/// ```rust
/// use ruvector_identity::EncoderConfig;
///
/// let config = EncoderConfig::new(27, 1000, 50).with_value_range(-2.0, 2.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Number of real features per observation
    pub input_dim: usize,

    /// Hypervector width in bits
    pub hv_dim: usize,

    /// Number of quantization levels
    pub levels: usize,

    /// Quantization range `(min, max)`; values outside are clamped
    #[serde(default = "default_value_range")]
    pub value_range: (f32, f32),

    /// Seed for basis and level generation
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_value_range() -> (f32, f32) {
    (-3.0, 3.0)
}

fn default_seed() -> u64 {
    42
}

impl EncoderConfig {
    /// Creates a configuration with the default value range and seed
    pub fn new(input_dim: usize, hv_dim: usize, levels: usize) -> Self {
        Self {
            input_dim,
            hv_dim,
            levels,
            value_range: default_value_range(),
            seed: default_seed(),
        }
    }

    /// Sets the quantization range
    pub fn with_value_range(mut self, min: f32, max: f32) -> Self {
        self.value_range = (min, max);
        self
    }

    /// Sets the generator seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks every field; dimensions must be positive and the range finite
    /// and non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(IdentityError::InvalidConfig(
                "input_dim must be greater than 0".to_string(),
            ));
        }
        if self.hv_dim == 0 {
            return Err(IdentityError::InvalidConfig(
                "hv_dim must be greater than 0".to_string(),
            ));
        }
        if self.levels == 0 {
            return Err(IdentityError::InvalidConfig(
                "levels must be greater than 0".to_string(),
            ));
        }

        let (min, max) = self.value_range;
        if !min.is_finite() || !max.is_finite() {
            return Err(IdentityError::InvalidConfig(format!(
                "value_range must be finite, got ({}, {})",
                min, max
            )));
        }
        if min >= max {
            return Err(IdentityError::InvalidConfig(format!(
                "value_range min must be below max, got ({}, {})",
                min, max
            )));
        }

        Ok(())
    }

    /// Bytes needed for one bit-packed hypervector
    #[inline]
    pub fn bytes_per_vector(&self) -> usize {
        self.hv_dim.div_ceil(8)
    }
}

impl Default for EncoderConfig {
    /// 27 geometric features, 10,000-bit hypervectors, 100 levels
    fn default() -> Self {
        Self::new(27, 10_000, 100)
    }
}

/// Host-side settings for [`IdentityVerifier`](crate::IdentityVerifier)
///
/// Loadable from JSON; missing fields take their defaults.
///
/// # Example
///
/// ```rust
/// use ruvector_identity::VerifierConfig;
///
/// let config = VerifierConfig::from_json_str(
///     r#"{ "encoder": { "input_dim": 27, "hv_dim": 2000, "levels": 64 },
///          "enrollment_samples": 3 }"#,
/// ).unwrap();
/// assert_eq!(config.enrollment_samples, 3);
/// assert_eq!(config.verify_threshold, 0.7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Encoder shape
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Samples collected before a user's prototype is trained
    #[serde(default = "default_enrollment_samples")]
    pub enrollment_samples: usize,

    /// Minimum confidence for a positive verification
    #[serde(default = "default_threshold")]
    pub verify_threshold: f32,

    /// Minimum confidence for an identification to name a user
    #[serde(default = "default_threshold")]
    pub identify_threshold: f32,

    /// Blend rate used by `update_user` when none is given
    ///
    /// Blending is all-or-nothing per call: below 0.5 the stored prototype is
    /// kept, so the default of 0.1 never changes an enrolled user. Set it
    /// above 0.5 for updates to replace the prototype.
    #[serde(default = "default_update_alpha")]
    pub update_alpha: f32,
}

fn default_enrollment_samples() -> usize {
    5
}

fn default_threshold() -> f32 {
    0.7
}

fn default_update_alpha() -> f32 {
    0.1
}

impl VerifierConfig {
    /// Parses a JSON document and validates it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serializes to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| IdentityError::Serialization(e.to_string()))
    }

    /// Validates the encoder section plus host thresholds
    pub fn validate(&self) -> Result<()> {
        self.encoder.validate()?;

        if self.enrollment_samples == 0 {
            return Err(IdentityError::InvalidConfig(
                "enrollment_samples must be greater than 0".to_string(),
            ));
        }
        for (name, value) in [
            ("verify_threshold", self.verify_threshold),
            ("identify_threshold", self.identify_threshold),
            ("update_alpha", self.update_alpha),
        ] {
            if !unit_interval(value) {
                return Err(IdentityError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            enrollment_samples: default_enrollment_samples(),
            verify_threshold: default_threshold(),
            identify_threshold: default_threshold(),
            update_alpha: default_update_alpha(),
        }
    }
}

/// True for finite values in `[0, 1]`
#[inline]
pub(crate) fn unit_interval(value: f32) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
