//! Production Environment implementation using the OS RNG.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait. Entity identifiers are drawn from it.

use spidlink_core::Environment;

/// Production environment using cryptographic RNG.
///
/// Uses `getrandom` for OS-level randomness, so registered identifiers are
/// unpredictable.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // NOTE: Should never fail on supported platforms. Zero-fill keeps
            // the server up; new_uuid still sets version bits, so IDs stay
            // non-nil but will collide and registration reports AlreadyExists.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
