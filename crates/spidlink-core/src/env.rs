//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples identifier generation from system
//! entropy. Production uses OS randomness; tests and the simulation harness
//! use a seeded RNG so registration produces the same IDs on every run.
//!
//! # Invariants
//!
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use uuid::Uuid;

/// Abstract source of randomness.
///
/// Registration is the only consumer: every new user or spid gets a random
/// (version 4) UUID drawn from here.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// Production implementations MUST use OS entropy (`getrandom`).
    /// Simulation implementations MUST be seeded and log the seed.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u128`.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }

    /// Generates a random version 4 UUID.
    ///
    /// The version and variant bits are always set, so the result is never
    /// the nil UUID.
    fn new_uuid(&self) -> Uuid {
        uuid::Builder::from_random_bytes(self.random_u128().to_be_bytes()).into_uuid()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[derive(Clone)]
    struct SeededEnv(Arc<Mutex<ChaCha8Rng>>);

    impl SeededEnv {
        fn new(seed: u64) -> Self {
            Self(Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))))
        }
    }

    impl Environment for SeededEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            self.0.lock().unwrap().fill_bytes(buffer);
        }
    }

    #[test]
    fn same_seed_same_uuids() {
        let a = SeededEnv::new(7);
        let b = SeededEnv::new(7);

        for _ in 0..16 {
            assert_eq!(a.new_uuid(), b.new_uuid());
        }
    }

    #[test]
    fn uuids_are_v4_and_never_nil() {
        let env = SeededEnv::new(1);

        for _ in 0..64 {
            let uuid = env.new_uuid();
            assert!(!uuid.is_nil());
            assert_eq!(uuid.get_version_num(), 4);
        }
    }
}
