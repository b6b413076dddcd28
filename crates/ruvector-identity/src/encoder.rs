//! HDC encoder and nearest-prototype classifier
//!
//! Encoding runs in three steps:
//!
//! 1. **Quantize** each feature to a level index by linear scaling against
//!    the configured value range, clamping outliers to the end levels.
//! 2. **Bind** the feature's basis vector with its level vector (XOR).
//! 3. **Bundle** the bound vectors by per-bit majority, ties set to 1.
//!
//! Classes are represented by one prototype hypervector each. Prototypes
//! are kept in insertion order, which is also the tie-break order for
//! predictions.

use crate::basis::HypervectorBasis;
use crate::config::{unit_interval, EncoderConfig};
use crate::error::{IdentityError, Result};
use crate::hdc::{best_match, blend_bipolar, top_k_similar, BinaryHypervector, MajorityCounter};
use crate::memory::MemoryReport;

/// One enrolled class and its prototype
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPrototype {
    /// Opaque class identifier
    pub class_id: String,
    /// Bundled hypervector representing the class
    pub vector: BinaryHypervector,
}

/// Hyperdimensional encoder with per-class prototypes
///
/// The basis is immutable after construction; the prototype list is the
/// only mutable state. The encoder itself takes no locks: share it through
/// [`IdentityVerifier`](crate::IdentityVerifier) when several threads need
/// it.
///
/// # Example
///
/// ```rust
/// use ruvector_identity::{EncoderConfig, HdcEncoder};
///
/// let mut encoder = HdcEncoder::new(EncoderConfig::new(4, 1000, 20)).unwrap();
/// encoder
///     .train(&[
///         ("alice", vec![1.0f32, 1.0, -1.0, 0.5]),
///         ("bob", vec![-2.0f32, 0.0, 2.0, -0.5]),
///     ])
///     .unwrap();
///
/// let (class_id, confidence) = encoder.predict(&[1.0, 1.1, -1.0, 0.5]).unwrap();
/// assert_eq!(class_id, "alice");
/// assert!(confidence > 0.9);
/// ```
#[derive(Debug, Clone)]
pub struct HdcEncoder {
    config: EncoderConfig,
    basis: HypervectorBasis,
    prototypes: Vec<ClassPrototype>,
}

impl HdcEncoder {
    /// Creates an encoder, generating its basis from `config.seed`
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;

        let basis =
            HypervectorBasis::generate(config.input_dim, config.hv_dim, config.levels, config.seed)?;

        tracing::debug!(
            input_dim = config.input_dim,
            hv_dim = config.hv_dim,
            levels = config.levels,
            "created HDC encoder"
        );

        Ok(Self {
            config,
            basis,
            prototypes: Vec::new(),
        })
    }

    /// Assembles an encoder from already validated parts
    pub(crate) fn from_parts(
        config: EncoderConfig,
        basis: HypervectorBasis,
        prototypes: Vec<ClassPrototype>,
    ) -> Self {
        Self {
            config,
            basis,
            prototypes,
        }
    }

    /// Swaps in a new basis and prototype set in one step
    pub(crate) fn install(&mut self, basis: HypervectorBasis, prototypes: Vec<ClassPrototype>) {
        self.basis = basis;
        self.prototypes = prototypes;
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn basis(&self) -> &HypervectorBasis {
        &self.basis
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    #[inline]
    pub fn hv_dim(&self) -> usize {
        self.config.hv_dim
    }

    #[inline]
    pub fn levels(&self) -> usize {
        self.config.levels
    }

    /// Checks length and finiteness of a feature vector
    pub fn validate_features(&self, features: &[f32]) -> Result<()> {
        if features.len() != self.config.input_dim {
            return Err(IdentityError::DimensionMismatch {
                expected: self.config.input_dim,
                actual: features.len(),
            });
        }

        if let Some((index, &value)) = features.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(IdentityError::InvalidValue { index, value });
        }

        Ok(())
    }

    /// Maps a finite value to its level index, clamping to `[0, levels)`
    ///
    /// Infinities clamp to the end levels. NaN is not rejected here and maps
    /// to level 0; [`encode`](Self::encode) validates its input first.
    pub fn quantize(&self, value: f32) -> usize {
        let max_level = self.config.levels - 1;
        if max_level == 0 {
            return 0;
        }

        let (min, max) = self.config.value_range;
        let scaled = (value as f64 - min as f64) / (max as f64 - min as f64) * max_level as f64;

        scaled.round().clamp(0.0, max_level as f64) as usize
    }

    /// Quantizes a whole feature vector after validating it
    pub fn quantize_features(&self, features: &[f32]) -> Result<Vec<usize>> {
        self.validate_features(features)?;
        Ok(features.iter().map(|&v| self.quantize(v)).collect())
    }

    /// Encodes a feature vector into a hypervector
    ///
    /// Deterministic: the same input always yields the same output.
    ///
    /// # Errors
    ///
    /// [`IdentityError::DimensionMismatch`] for a wrong length and
    /// [`IdentityError::InvalidValue`] for NaN or infinite entries.
    pub fn encode(&self, features: &[f32]) -> Result<BinaryHypervector> {
        self.validate_features(features)?;
        Ok(self.encode_unchecked(features))
    }

    fn encode_unchecked(&self, features: &[f32]) -> BinaryHypervector {
        let mut counter = MajorityCounter::new(self.config.hv_dim);

        for (i, &value) in features.iter().enumerate() {
            let level = self.quantize(value);
            let bound = self.basis.feature(i).bind(self.basis.level(level));
            counter.add(&bound);
        }

        // input_dim > 0 is guaranteed by the config, so the vote is never empty
        counter
            .finish()
            .unwrap_or_else(|_| BinaryHypervector::zeros(self.config.hv_dim))
    }

    /// Trains one prototype per class from labeled samples
    ///
    /// Samples are grouped by class id; each group's encodings are bundled
    /// into a prototype that replaces any previous one for that class.
    /// Classes not present in `samples` are left untouched. Every sample is
    /// validated before any prototype changes.
    pub fn train<S, F>(&mut self, samples: &[(S, F)]) -> Result<()>
    where
        S: AsRef<str>,
        F: AsRef<[f32]>,
    {
        if samples.is_empty() {
            return Err(IdentityError::EmptyTrainingSet);
        }
        for (_, features) in samples {
            self.validate_features(features.as_ref())?;
        }

        // First-seen order keeps new classes in a predictable position
        let mut groups: Vec<(&str, MajorityCounter)> = Vec::new();
        for (class_id, features) in samples {
            let class_id = class_id.as_ref();
            let encoded = self.encode_unchecked(features.as_ref());

            match groups.iter_mut().find(|(id, _)| *id == class_id) {
                Some((_, counter)) => counter.add(&encoded),
                None => {
                    let mut counter = MajorityCounter::new(self.config.hv_dim);
                    counter.add(&encoded);
                    groups.push((class_id, counter));
                }
            }
        }

        let mut trained = Vec::with_capacity(groups.len());
        for (class_id, counter) in &groups {
            tracing::debug!(class_id, samples = counter.len(), "trained class prototype");
            trained.push((class_id.to_string(), counter.finish()?));
        }
        for (class_id, vector) in trained {
            self.upsert(class_id, vector);
        }

        Ok(())
    }

    /// Predicts the class of a feature vector
    ///
    /// Returns the class with the highest normalized Hamming similarity and
    /// that similarity as confidence in `[0, 1]`. Equal similarities go to
    /// the class inserted first.
    pub fn predict(&self, features: &[f32]) -> Result<(String, f32)> {
        if self.prototypes.is_empty() {
            return Err(IdentityError::NotTrained);
        }

        let query = self.encode(features)?;
        self.predict_encoded(&query)
    }

    /// Predicts from an already encoded query
    pub fn predict_encoded(&self, query: &BinaryHypervector) -> Result<(String, f32)> {
        let (idx, confidence) =
            best_match(query, self.prototypes.iter().map(|p| &p.vector)).ok_or(IdentityError::NotTrained)?;

        Ok((self.prototypes[idx].class_id.clone(), confidence))
    }

    /// Similarity of a feature vector to every prototype, in insertion order
    pub fn similarities(&self, features: &[f32]) -> Result<Vec<(String, f32)>> {
        if self.prototypes.is_empty() {
            return Err(IdentityError::NotTrained);
        }

        let query = self.encode(features)?;
        Ok(self
            .prototypes
            .iter()
            .map(|p| (p.class_id.clone(), query.similarity(&p.vector)))
            .collect())
    }

    /// The `k` best classes, most similar first; ties keep insertion order
    pub fn predict_top_k(&self, features: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if k == 0 {
            return Err(IdentityError::InvalidParameter(
                "k must be greater than 0".to_string(),
            ));
        }
        if self.prototypes.is_empty() {
            return Err(IdentityError::NotTrained);
        }

        let query = self.encode(features)?;
        Ok(top_k_similar(&query, self.prototypes.iter().map(|p| &p.vector), k)
            .into_iter()
            .map(|(idx, sim)| (self.prototypes[idx].class_id.clone(), sim))
            .collect())
    }

    /// Blends one observation into a class prototype
    ///
    /// `alpha` in `[0, 1]` weights the new sample against the stored
    /// prototype in bipolar space; see [`blend_bipolar`] for the rule. A
    /// class without a prototype is created from the sample alone and
    /// `alpha` is ignored. The prototype size never changes.
    pub fn update_prototype(&mut self, class_id: &str, features: &[f32], alpha: f32) -> Result<()> {
        if !unit_interval(alpha) {
            return Err(IdentityError::InvalidParameter(format!(
                "alpha must be within [0, 1], got {}",
                alpha
            )));
        }

        let encoded = self.encode(features)?;

        match self.prototypes.iter_mut().find(|p| p.class_id == class_id) {
            Some(prototype) => {
                prototype.vector = blend_bipolar(&prototype.vector, &encoded, alpha);
            }
            None => {
                tracing::debug!(class_id, "creating prototype from first update");
                self.prototypes.push(ClassPrototype {
                    class_id: class_id.to_string(),
                    vector: encoded,
                });
            }
        }

        Ok(())
    }

    /// Reports the packed footprint of basis, levels and prototypes
    pub fn memory_usage(&self) -> MemoryReport {
        MemoryReport::for_shape(
            self.config.hv_dim,
            self.basis.input_dim(),
            self.basis.num_levels(),
            self.prototypes.len(),
        )
    }

    /// Class ids in insertion order
    pub fn class_ids(&self) -> impl Iterator<Item = &str> {
        self.prototypes.iter().map(|p| p.class_id.as_str())
    }

    /// All prototypes in insertion order
    pub fn prototypes(&self) -> &[ClassPrototype] {
        &self.prototypes
    }

    /// Prototype of `class_id`, if any
    pub fn prototype(&self, class_id: &str) -> Option<&BinaryHypervector> {
        self.prototypes
            .iter()
            .find(|p| p.class_id == class_id)
            .map(|p| &p.vector)
    }

    pub fn contains_class(&self, class_id: &str) -> bool {
        self.prototype(class_id).is_some()
    }

    pub fn num_classes(&self) -> usize {
        self.prototypes.len()
    }

    /// Removes a class, returning its prototype
    pub fn remove_class(&mut self, class_id: &str) -> Option<BinaryHypervector> {
        let idx = self.prototypes.iter().position(|p| p.class_id == class_id)?;
        Some(self.prototypes.remove(idx).vector)
    }

    /// Drops every prototype; the basis is kept
    pub fn clear(&mut self) {
        self.prototypes.clear();
    }

    fn upsert(&mut self, class_id: String, vector: BinaryHypervector) {
        match self.prototypes.iter_mut().find(|p| p.class_id == class_id) {
            Some(existing) => existing.vector = vector,
            None => self.prototypes.push(ClassPrototype { class_id, vector }),
        }
    }
}
