// Identity verifier: enrollment flow, concurrency and persistence

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use ruvector_identity::{
    EncoderConfig, EnrollmentStatus, IdentityError, IdentityVerifier, VerifierConfig,
};
use std::thread;
use tempfile::tempdir;

const INPUT_DIM: usize = 27;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn config() -> VerifierConfig {
    VerifierConfig {
        encoder: EncoderConfig::new(INPUT_DIM, 2000, 50),
        enrollment_samples: 5,
        ..Default::default()
    }
}

/// A user's mean face plus small per-capture noise
struct SyntheticUser {
    mean: Vec<f32>,
    noise: Normal<f32>,
}

impl SyntheticUser {
    fn new(rng: &mut StdRng) -> Self {
        let spread = Normal::new(0.0f32, 1.2).unwrap();
        Self {
            mean: (0..INPUT_DIM).map(|_| spread.sample(rng)).collect(),
            noise: Normal::new(0.0f32, 0.05).unwrap(),
        }
    }

    fn capture(&self, rng: &mut StdRng) -> Vec<f32> {
        self.mean.iter().map(|m| m + self.noise.sample(rng)).collect()
    }
}

fn enrolled(verifier: &IdentityVerifier, rng: &mut StdRng, names: &[&str]) -> Vec<SyntheticUser> {
    names
        .iter()
        .map(|name| {
            let user = SyntheticUser::new(rng);
            let mut status = EnrollmentStatus::Pending {
                collected: 0,
                required: 5,
            };
            for _ in 0..5 {
                status = verifier.enroll(name, &user.capture(rng)).unwrap();
            }
            assert_eq!(status, EnrollmentStatus::Completed { samples: 5 });
            user
        })
        .collect()
}

#[test]
fn test_enroll_verify_identify() {
    init_tracing();
    let verifier = IdentityVerifier::new(config()).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let users = enrolled(&verifier, &mut rng, &["alice", "bob", "carol"]);

    assert_eq!(verifier.enrolled_users(), vec!["alice", "bob", "carol"]);

    let query = users[1].capture(&mut rng);
    let result = verifier.verify("bob", &query, None).unwrap();
    assert!(result.verified, "{:?}", result);
    assert!(result.confidence >= 0.7);

    let impostor = verifier.verify("alice", &query, None).unwrap();
    assert!(!impostor.verified);
    assert_eq!(impostor.predicted_id, "bob");

    let found = verifier.identify(&users[2].capture(&mut rng), None).unwrap();
    assert_eq!(found.user_id.as_deref(), Some("carol"));

    let stats = verifier.stats();
    assert_eq!(stats.enrollments, 3);
    assert_eq!(stats.verifications, 2);
    assert_eq!(stats.identifications, 1);
    assert_eq!(stats.num_enrolled_users, 3);
}

#[test]
fn test_concurrent_verification() {
    let verifier = IdentityVerifier::new(config()).unwrap();
    let mut rng = StdRng::seed_from_u64(12);
    let users = enrolled(&verifier, &mut rng, &["u0", "u1", "u2", "u3"]);

    let queries: Vec<(String, Vec<f32>)> = users
        .iter()
        .enumerate()
        .flat_map(|(i, user)| {
            (0..5)
                .map(|_| (format!("u{}", i), user.capture(&mut rng)))
                .collect::<Vec<_>>()
        })
        .collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let verifier = verifier.clone();
            let queries = queries.clone();
            thread::spawn(move || {
                queries
                    .iter()
                    .filter(|(id, features)| verifier.verify(id, features, None).unwrap().verified)
                    .count()
            })
        })
        .collect();

    // Writers replace u0's prototype while readers verify
    let captures = [users[0].capture(&mut rng), users[0].capture(&mut rng)];
    let before = verifier.encoder().prototype("u0").unwrap().clone();
    let updater = {
        let verifier = verifier.clone();
        let captures = captures.clone();
        thread::spawn(move || {
            for i in 0..10 {
                verifier
                    .update_user("u0", &captures[i % 2], Some(1.0))
                    .unwrap();
            }
        })
    };

    for handle in handles {
        assert_eq!(handle.join().unwrap(), queries.len());
    }
    updater.join().unwrap();

    {
        let encoder = verifier.encoder();
        let after = encoder.prototype("u0").unwrap();
        assert_eq!(after, &encoder.encode(&captures[1]).unwrap());
        assert_ne!(after, &before);
    }

    let stats = verifier.stats();
    assert_eq!(stats.verifications, 4 * queries.len() as u64);
    assert_eq!(stats.updates, 10);
}

#[test]
fn test_save_and_load_model() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("identity.hdc");

    let verifier = IdentityVerifier::new(config()).unwrap();
    let mut rng = StdRng::seed_from_u64(13);
    let users = enrolled(&verifier, &mut rng, &["alice", "bob"]);
    verifier.save_model(&path).unwrap();

    let restored = IdentityVerifier::new(config()).unwrap();
    let stray = users[0].capture(&mut rng);
    restored.enroll("pending", &stray).unwrap();
    restored.load_model(&path).unwrap();

    assert_eq!(restored.enrolled_users(), vec!["alice", "bob"]);
    assert_eq!(restored.pending_samples("pending"), 0);

    let query = users[0].capture(&mut rng);
    let a = verifier.verify("alice", &query, None).unwrap();
    let b = restored.verify("alice", &query, None).unwrap();
    assert_eq!(a.verified, b.verified);
    assert_eq!(a.confidence, b.confidence);
}

#[test]
fn test_failed_load_keeps_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.hdc");
    std::fs::write(&path, b"HDC1 not really a model").unwrap();

    let verifier = IdentityVerifier::new(config()).unwrap();
    let mut rng = StdRng::seed_from_u64(14);
    let users = enrolled(&verifier, &mut rng, &["alice"]);
    verifier.enroll("bob", &users[0].capture(&mut rng)).unwrap();

    assert!(matches!(
        verifier.load_model(&path),
        Err(IdentityError::CorruptModel(_))
    ));
    assert_eq!(verifier.enrolled_users(), vec!["alice"]);
    assert_eq!(verifier.pending_samples("bob"), 1);
}

#[test]
fn test_export_header_through_verifier() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hdc_model.h");

    let verifier = IdentityVerifier::new(config()).unwrap();
    assert!(matches!(
        verifier.export_c_header(&path, false),
        Err(IdentityError::NotTrained)
    ));

    let mut rng = StdRng::seed_from_u64(15);
    enrolled(&verifier, &mut rng, &["alice"]);
    verifier.export_c_header(&path, false).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("#define NUM_USERS 1\n"));
}

#[test]
fn test_config_from_json_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("verifier.json");
    std::fs::write(
        &path,
        r#"{
            "encoder": { "input_dim": 27, "hv_dim": 4096, "levels": 64, "seed": 5 },
            "enrollment_samples": 3,
            "verify_threshold": 0.8
        }"#,
    )
    .unwrap();

    let config = VerifierConfig::from_json_file(&path).unwrap();
    assert_eq!(config.encoder.hv_dim, 4096);
    assert_eq!(config.encoder.seed, 5);
    assert_eq!(config.encoder.value_range, (-3.0, 3.0));
    assert_eq!(config.enrollment_samples, 3);
    assert_eq!(config.verify_threshold, 0.8);
    assert_eq!(config.identify_threshold, 0.7);

    let verifier = IdentityVerifier::new(config).unwrap();
    assert_eq!(verifier.config().enrollment_samples, 3);
}

#[test]
fn test_memory_fits_embedded_budget() {
    let verifier = IdentityVerifier::new(config()).unwrap();
    let mut rng = StdRng::seed_from_u64(16);
    enrolled(&verifier, &mut rng, &["a", "b", "c", "d", "e"]);

    let memory = verifier.stats().memory;
    assert_eq!(memory.bytes_per_vector, 250);
    assert!(memory.fits(&Default::default()));
}
