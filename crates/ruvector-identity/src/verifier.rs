//! Thread-safe identity verification on top of the encoder
//!
//! [`IdentityVerifier`] collects enrollment samples per user, trains a
//! prototype once enough are buffered, and answers 1:1 verification and
//! 1:N identification queries against the enrolled prototypes.
//!
//! The encoder sits behind a single-writer `RwLock`: verification and
//! identification share read access, while enrollment, updates and model
//! loading take the write lock. Cloning a verifier shares its state.

use crate::config::{unit_interval, VerifierConfig};
use crate::encoder::HdcEncoder;
use crate::error::{IdentityError, Result};
use crate::memory::MemoryReport;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of [`IdentityVerifier::enroll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    /// More samples are needed before the prototype is trained
    Pending { collected: usize, required: usize },
    /// The prototype was trained from `samples` observations
    Completed { samples: usize },
}

impl EnrollmentStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, EnrollmentStatus::Completed { .. })
    }
}

/// Outcome of a 1:1 verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// True when the best match is the claimed user with enough confidence
    pub verified: bool,
    pub claimed_id: String,
    /// Best matching class over all prototypes
    pub predicted_id: String,
    /// Similarity to the best matching prototype
    pub confidence: f32,
    /// Similarity to the claimed user's prototype
    pub claimed_similarity: f32,
    pub threshold: f32,
    pub elapsed: Duration,
}

/// Outcome of a 1:N identification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResult {
    /// Best match, or `None` when its confidence is below the threshold
    pub user_id: Option<String>,
    pub confidence: f32,
    pub elapsed: Duration,
}

/// Operation counters and current footprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierStats {
    pub enrollments: u64,
    pub verifications: u64,
    pub identifications: u64,
    pub updates: u64,
    pub num_enrolled_users: usize,
    pub memory: MemoryReport,
}

#[derive(Debug, Default)]
struct Counters {
    enrollments: AtomicU64,
    verifications: AtomicU64,
    identifications: AtomicU64,
    updates: AtomicU64,
}

/// Enrollment, verification and identification service
///
/// # Example
///
/// ```rust
/// use ruvector_identity::{EncoderConfig, IdentityVerifier, VerifierConfig};
///
/// let config = VerifierConfig {
///     encoder: EncoderConfig::new(4, 1000, 20),
///     enrollment_samples: 2,
///     ..Default::default()
/// };
/// let verifier = IdentityVerifier::new(config).unwrap();
///
/// verifier.enroll("alice", &[1.0, 1.0, -1.0, 0.5]).unwrap();
/// let status = verifier.enroll("alice", &[1.1, 0.9, -1.0, 0.5]).unwrap();
/// assert!(status.is_complete());
///
/// let result = verifier.verify("alice", &[1.0, 1.0, -1.0, 0.5], None).unwrap();
/// assert!(result.verified);
/// ```
#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    config: Arc<VerifierConfig>,
    encoder: Arc<RwLock<HdcEncoder>>,
    pending: Arc<Mutex<HashMap<String, Vec<Vec<f32>>>>>,
    counters: Arc<Counters>,
}

impl IdentityVerifier {
    /// Creates a verifier with a fresh encoder
    pub fn new(config: VerifierConfig) -> Result<Self> {
        config.validate()?;
        let encoder = HdcEncoder::new(config.encoder.clone())?;

        tracing::info!(
            "Created identity verifier ({} features, {} bits, {} samples per enrollment)",
            config.encoder.input_dim,
            config.encoder.hv_dim,
            config.enrollment_samples
        );

        Ok(Self {
            config: Arc::new(config),
            encoder: Arc::new(RwLock::new(encoder)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Read access to the underlying encoder
    ///
    /// Writers block while the guard is held.
    pub fn encoder(&self) -> RwLockReadGuard<'_, HdcEncoder> {
        self.encoder.read()
    }

    /// Buffers one enrollment sample for `user_id`
    ///
    /// Once `enrollment_samples` samples are buffered the user's prototype is
    /// trained from them, replacing any earlier prototype.
    pub fn enroll(&self, user_id: &str, features: &[f32]) -> Result<EnrollmentStatus> {
        self.encoder.read().validate_features(features)?;

        let required = self.config.enrollment_samples;
        let mut pending = self.pending.lock();
        let buffer = pending.entry(user_id.to_string()).or_default();
        buffer.push(features.to_vec());

        let collected = buffer.len();
        if collected < required {
            tracing::debug!(user_id, collected, required, "buffered enrollment sample");
            return Ok(EnrollmentStatus::Pending {
                collected,
                required,
            });
        }

        let samples: Vec<(&str, Vec<f32>)> = pending
            .remove(user_id)
            .unwrap_or_default()
            .into_iter()
            .map(|sample| (user_id, sample))
            .collect();
        self.encoder.write().train(&samples)?;
        self.counters.enrollments.fetch_add(1, Ordering::Relaxed);

        tracing::info!("Enrolled user {} from {} samples", user_id, samples.len());
        Ok(EnrollmentStatus::Completed {
            samples: samples.len(),
        })
    }

    /// Samples buffered so far for `user_id`
    pub fn pending_samples(&self, user_id: &str) -> usize {
        self.pending.lock().get(user_id).map_or(0, Vec::len)
    }

    /// Drops buffered samples for `user_id` without training
    pub fn cancel_enrollment(&self, user_id: &str) -> bool {
        self.pending.lock().remove(user_id).is_some()
    }

    /// Checks whether `features` belong to `user_id`
    ///
    /// Verified when the best match over all users is `user_id` and its
    /// confidence reaches the threshold (`verify_threshold` when `None`).
    ///
    /// # Errors
    ///
    /// `UnknownClass` if `user_id` is not enrolled, `InvalidParameter` for a
    /// threshold outside `[0, 1]`, plus the encoder's input errors.
    pub fn verify(
        &self,
        user_id: &str,
        features: &[f32],
        threshold: Option<f32>,
    ) -> Result<VerificationResult> {
        let threshold = check_threshold(threshold.unwrap_or(self.config.verify_threshold))?;
        let start = Instant::now();

        let encoder = self.encoder.read();
        let claimed = encoder
            .prototype(user_id)
            .ok_or_else(|| IdentityError::UnknownClass(user_id.to_string()))?;

        let query = encoder.encode(features)?;
        let claimed_similarity = query.similarity(claimed);
        let (predicted_id, confidence) = encoder.predict_encoded(&query)?;
        drop(encoder);

        let verified = predicted_id == user_id && confidence >= threshold;
        self.counters.verifications.fetch_add(1, Ordering::Relaxed);

        if !verified {
            tracing::warn!(
                claimed = user_id,
                predicted = %predicted_id,
                confidence,
                threshold,
                "verification rejected"
            );
        }

        Ok(VerificationResult {
            verified,
            claimed_id: user_id.to_string(),
            predicted_id,
            confidence,
            claimed_similarity,
            threshold,
            elapsed: start.elapsed(),
        })
    }

    /// Finds the enrolled user closest to `features`
    ///
    /// `user_id` is `None` when the best confidence is below the threshold
    /// (`identify_threshold` when `None`).
    pub fn identify(&self, features: &[f32], threshold: Option<f32>) -> Result<IdentificationResult> {
        let threshold = check_threshold(threshold.unwrap_or(self.config.identify_threshold))?;
        let start = Instant::now();

        let (best, confidence) = self.encoder.read().predict(features)?;
        self.counters.identifications.fetch_add(1, Ordering::Relaxed);

        let user_id = (confidence >= threshold).then_some(best);
        Ok(IdentificationResult {
            user_id,
            confidence,
            elapsed: start.elapsed(),
        })
    }

    /// Blends a new observation into an enrolled user's prototype
    ///
    /// Uses `update_alpha` when `alpha` is `None`.
    pub fn update_user(&self, user_id: &str, features: &[f32], alpha: Option<f32>) -> Result<()> {
        let alpha = alpha.unwrap_or(self.config.update_alpha);

        let mut encoder = self.encoder.write();
        if !encoder.contains_class(user_id) {
            return Err(IdentityError::UnknownClass(user_id.to_string()));
        }
        encoder.update_prototype(user_id, features, alpha)?;
        drop(encoder);

        self.counters.updates.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(user_id, alpha, "updated user prototype");
        Ok(())
    }

    /// Removes a user and any buffered samples; true if a prototype existed
    pub fn remove_user(&self, user_id: &str) -> bool {
        let mut pending = self.pending.lock();
        pending.remove(user_id);
        let removed = self.encoder.write().remove_class(user_id).is_some();

        if removed {
            tracing::info!("Removed user {}", user_id);
        }
        removed
    }

    /// Enrolled user ids in enrollment order
    pub fn enrolled_users(&self) -> Vec<String> {
        self.encoder.read().class_ids().map(str::to_owned).collect()
    }

    pub fn is_enrolled(&self, user_id: &str) -> bool {
        self.encoder.read().contains_class(user_id)
    }

    pub fn stats(&self) -> VerifierStats {
        let encoder = self.encoder.read();
        VerifierStats {
            enrollments: self.counters.enrollments.load(Ordering::Relaxed),
            verifications: self.counters.verifications.load(Ordering::Relaxed),
            identifications: self.counters.identifications.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            num_enrolled_users: encoder.num_classes(),
            memory: encoder.memory_usage(),
        }
    }

    /// Saves the encoder in the `HDC1` layout
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.encoder.read().save_model(path)
    }

    /// Replaces the encoder state with a saved model
    ///
    /// The model must match this verifier's dimensions. On success pending
    /// enrollments are discarded; on failure nothing changes.
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = std::fs::read(path.as_ref())?;

        let mut pending = self.pending.lock();
        let mut encoder = self.encoder.write();
        encoder.restore_model_bytes(&bytes)?;
        let discarded = pending.len();
        pending.clear();

        tracing::info!(
            "Loaded model from {} ({} users, {} pending enrollments discarded)",
            path.as_ref().display(),
            encoder.num_classes(),
            discarded
        );
        Ok(())
    }

    /// Writes a C header for the enrolled users
    pub fn export_c_header<P: AsRef<Path>>(&self, path: P, with_data: bool) -> Result<()> {
        self.encoder.read().export_c_header(path, with_data)
    }
}

fn check_threshold(threshold: f32) -> Result<f32> {
    if unit_interval(threshold) {
        Ok(threshold)
    } else {
        Err(IdentityError::InvalidParameter(format!(
            "threshold must be within [0, 1], got {}",
            threshold
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncoderConfig;

    fn verifier(samples: usize) -> IdentityVerifier {
        IdentityVerifier::new(VerifierConfig {
            encoder: EncoderConfig::new(4, 1000, 20),
            enrollment_samples: samples,
            ..Default::default()
        })
        .unwrap()
    }

    const ALICE: [f32; 4] = [1.0, 1.0, -1.0, 0.5];
    const BOB: [f32; 4] = [-2.0, 0.0, 2.0, -0.5];

    #[test]
    fn test_enrollment_buffers_until_complete() {
        let v = verifier(3);

        assert_eq!(
            v.enroll("alice", &ALICE).unwrap(),
            EnrollmentStatus::Pending {
                collected: 1,
                required: 3
            }
        );
        assert_eq!(v.pending_samples("alice"), 1);
        assert!(!v.is_enrolled("alice"));

        v.enroll("alice", &ALICE).unwrap();
        let status = v.enroll("alice", &ALICE).unwrap();
        assert_eq!(status, EnrollmentStatus::Completed { samples: 3 });
        assert!(v.is_enrolled("alice"));
        assert_eq!(v.pending_samples("alice"), 0);
        assert_eq!(v.stats().enrollments, 1);
    }

    #[test]
    fn test_enroll_rejects_bad_features() {
        let v = verifier(2);
        assert!(matches!(
            v.enroll("alice", &[1.0, 2.0]),
            Err(IdentityError::DimensionMismatch { .. })
        ));
        assert!(v.enroll("alice", &[1.0, f32::NAN, 0.0, 0.0]).is_err());
        assert_eq!(v.pending_samples("alice"), 0);
    }

    #[test]
    fn test_cancel_enrollment() {
        let v = verifier(3);
        v.enroll("alice", &ALICE).unwrap();
        assert!(v.cancel_enrollment("alice"));
        assert!(!v.cancel_enrollment("alice"));
        assert_eq!(v.pending_samples("alice"), 0);
    }

    #[test]
    fn test_verify_genuine_and_impostor() {
        let v = verifier(1);
        v.enroll("alice", &ALICE).unwrap();
        v.enroll("bob", &BOB).unwrap();

        let genuine = v.verify("alice", &ALICE, None).unwrap();
        assert!(genuine.verified);
        assert_eq!(genuine.predicted_id, "alice");
        assert_eq!(genuine.confidence, 1.0);
        assert_eq!(genuine.claimed_similarity, 1.0);
        assert_eq!(genuine.threshold, 0.7);

        let impostor = v.verify("alice", &BOB, None).unwrap();
        assert!(!impostor.verified);
        assert_eq!(impostor.predicted_id, "bob");
        assert!(impostor.claimed_similarity < impostor.confidence);
        assert_eq!(v.stats().verifications, 2);
    }

    #[test]
    fn test_verify_threshold_applies() {
        let v = verifier(1);
        v.enroll("alice", &ALICE).unwrap();

        let near = [1.5, 0.5, -1.0, 0.5];
        let strict = v.verify("alice", &near, Some(1.0)).unwrap();
        assert!(!strict.verified);
        assert_eq!(strict.predicted_id, "alice");

        let lenient = v.verify("alice", &near, Some(0.0)).unwrap();
        assert!(lenient.verified);
    }

    #[test]
    fn test_verify_unknown_user() {
        let v = verifier(1);
        v.enroll("alice", &ALICE).unwrap();
        assert!(matches!(
            v.verify("mallory", &ALICE, None),
            Err(IdentityError::UnknownClass(_))
        ));
    }

    #[test]
    fn test_threshold_range_checked() {
        let v = verifier(1);
        v.enroll("alice", &ALICE).unwrap();
        assert!(matches!(
            v.verify("alice", &ALICE, Some(1.5)),
            Err(IdentityError::InvalidParameter(_))
        ));
        assert!(matches!(
            v.identify(&ALICE, Some(-0.1)),
            Err(IdentityError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_identify() {
        let v = verifier(1);
        assert!(matches!(
            v.identify(&ALICE, None),
            Err(IdentityError::NotTrained)
        ));

        v.enroll("alice", &ALICE).unwrap();
        v.enroll("bob", &BOB).unwrap();

        let found = v.identify(&BOB, None).unwrap();
        assert_eq!(found.user_id.as_deref(), Some("bob"));
        assert_eq!(found.confidence, 1.0);

        let strict = v.identify(&[0.0, 0.0, 0.0, 0.0], Some(1.0)).unwrap();
        assert!(strict.user_id.is_none());
        assert_eq!(v.stats().identifications, 2);
    }

    #[test]
    fn test_update_user() {
        let v = verifier(1);
        assert!(matches!(
            v.update_user("alice", &ALICE, None),
            Err(IdentityError::UnknownClass(_))
        ));

        v.enroll("alice", &ALICE).unwrap();
        let before = v.encoder().prototype("alice").cloned();

        // Default alpha 0.1 keeps the binary prototype
        v.update_user("alice", &BOB, None).unwrap();
        assert_eq!(v.encoder().prototype("alice").cloned(), before);

        v.update_user("alice", &BOB, Some(1.0)).unwrap();
        let (label, _) = v.encoder().predict(&BOB).unwrap();
        assert_eq!(label, "alice");
        assert_eq!(v.stats().updates, 2);
    }

    #[test]
    fn test_remove_user() {
        let v = verifier(2);
        v.enroll("alice", &ALICE).unwrap();
        v.enroll("alice", &ALICE).unwrap();
        v.enroll("bob", &BOB).unwrap();

        assert!(v.remove_user("alice"));
        assert!(!v.remove_user("alice"));
        assert!(!v.remove_user("bob"));
        assert_eq!(v.pending_samples("bob"), 0);
        assert!(v.enrolled_users().is_empty());
    }

    #[test]
    fn test_stats_memory() {
        let v = verifier(1);
        v.enroll("alice", &ALICE).unwrap();
        v.enroll("bob", &BOB).unwrap();

        let stats = v.stats();
        assert_eq!(stats.num_enrolled_users, 2);
        assert_eq!(stats.memory.num_classes, 2);
        assert_eq!(stats.memory.prototype_bytes, 2 * 125);
        assert_eq!(v.enrolled_users(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_clones_share_state() {
        let v = verifier(1);
        let other = v.clone();
        v.enroll("alice", &ALICE).unwrap();
        assert!(other.is_enrolled("alice"));
    }
}
