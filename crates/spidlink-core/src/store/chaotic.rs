//! Fault-injecting store wrapper.
//!
//! Wraps any [`EntityStore`] and fails selected `put_user`/`put_spid` calls
//! with [`StoreError::Unavailable`]. Put failures are either scripted (fail
//! the N-th upcoming put) or drawn from a seeded RNG, so every failure pattern
//! is reproducible. Reads (`get_user`/`get_spid`) fail only when scripted.
//! Inserts and removes are never faulted.

use std::{
    collections::BTreeSet,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{EntityStore, StoreError, Version, Versioned};
use crate::{
    entity::{Spid, User},
    ids::{SpidId, UserId},
};

/// Seeded random failure source.
#[derive(Debug)]
struct RandomFaults {
    rate: f64,
    rng: StdRng,
}

/// Store wrapper that injects write failures.
#[derive(Debug)]
pub struct ChaoticStore<S> {
    inner: S,
    /// Puts attempted so far (faulted or not).
    put_calls: AtomicU64,
    /// Put ordinals scheduled to fail.
    scripted: Mutex<BTreeSet<u64>>,
    /// Gets attempted so far (faulted or not).
    get_calls: AtomicU64,
    /// Get ordinals scheduled to fail.
    scripted_gets: Mutex<BTreeSet<u64>>,
    random: Option<Mutex<RandomFaults>>,
    injected: AtomicU64,
}

impl<S: EntityStore> ChaoticStore<S> {
    /// Wrap `inner` with no faults scheduled.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            put_calls: AtomicU64::new(0),
            scripted: Mutex::new(BTreeSet::new()),
            get_calls: AtomicU64::new(0),
            scripted_gets: Mutex::new(BTreeSet::new()),
            random: None,
            injected: AtomicU64::new(0),
        }
    }

    /// Additionally fail each put with probability `rate`, using `seed`.
    pub fn with_failure_rate(mut self, rate: f64, seed: u64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self.random = Some(Mutex::new(RandomFaults { rate, rng: StdRng::seed_from_u64(seed) }));
        self
    }

    /// Let the next `skip` puts through, then fail the `count` after them.
    ///
    /// `fail_puts_after(1, 1)` fails the second write of an association;
    /// `fail_puts_after(1, 2)` also fails its compensating write.
    pub fn fail_puts_after(&self, skip: u64, count: u64) {
        let start = self.put_calls.load(Ordering::SeqCst) + skip;
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.extend(start..start + count);
        }
    }

    /// Let the next `skip` gets through, then fail the `count` after them.
    ///
    /// Gets of both kinds share one counter: `associate` reads the user
    /// first, so `fail_gets_after(0, 1)` fails its user read and
    /// `fail_gets_after(1, 1)` its spid read.
    pub fn fail_gets_after(&self, skip: u64, count: u64) {
        let start = self.get_calls.load(Ordering::SeqCst) + skip;
        if let Ok(mut scripted) = self.scripted_gets.lock() {
            scripted.extend(start..start + count);
        }
    }

    /// Drop all scripted failures.
    pub fn clear_faults(&self) {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.clear();
        }
        if let Ok(mut scripted) = self.scripted_gets.lock() {
            scripted.clear();
        }
    }

    /// Number of gets attempted so far.
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of puts attempted so far.
    pub fn put_calls(&self) -> u64 {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Number of puts failed on purpose.
    pub fn injected_failures(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    /// Wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Decide whether the current put fails.
    fn check_put(&self) -> Result<(), StoreError> {
        let ordinal = self.put_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.scripted.lock().map(|mut s| s.remove(&ordinal)).unwrap_or(false);
        let random = self.random.as_ref().is_some_and(|faults| {
            faults.lock().map(|mut f| {
                let rate = f.rate;
                f.rng.gen_bool(rate)
            })
            .unwrap_or(false)
        });

        if scripted || random {
            self.injected.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(ordinal, "injecting put failure");
            return Err(StoreError::Unavailable(format!("injected fault on put #{ordinal}")));
        }

        Ok(())
    }

    /// Decide whether the current get fails.
    fn check_get(&self) -> Result<(), StoreError> {
        let ordinal = self.get_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.scripted_gets.lock().map(|mut s| s.remove(&ordinal)).unwrap_or(false);
        if scripted {
            self.injected.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(ordinal, "injecting get failure");
            return Err(StoreError::Unavailable(format!("injected fault on get #{ordinal}")));
        }

        Ok(())
    }
}

impl<S: EntityStore> EntityStore for ChaoticStore<S> {
    fn get_user(&self, id: UserId) -> Result<Versioned<User>, StoreError> {
        self.check_get()?;
        self.inner.get_user(id)
    }

    fn get_spid(&self, id: SpidId) -> Result<Versioned<Spid>, StoreError> {
        self.check_get()?;
        self.inner.get_spid(id)
    }

    fn put_user(&self, user: &User, expected: Version) -> Result<Version, StoreError> {
        self.check_put()?;
        self.inner.put_user(user, expected)
    }

    fn put_spid(&self, spid: &Spid, expected: Version) -> Result<Version, StoreError> {
        self.check_put()?;
        self.inner.put_spid(spid, expected)
    }

    fn insert_user(&self, user: &User) -> Result<Version, StoreError> {
        self.inner.insert_user(user)
    }

    fn insert_spid(&self, spid: &Spid) -> Result<Version, StoreError> {
        self.inner.insert_spid(spid)
    }

    fn remove_user(&self, id: UserId, expected: Version) -> Result<(), StoreError> {
        self.inner.remove_user(id, expected)
    }

    fn remove_spid(&self, id: SpidId, expected: Version) -> Result<(), StoreError> {
        self.inner.remove_spid(id, expected)
    }
}
