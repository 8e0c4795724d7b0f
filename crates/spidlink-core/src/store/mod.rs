//! Entity storage abstraction.
//!
//! The association protocol needs only `get` and `put` per entity kind; the
//! registry adds `insert` and `remove`. There is no cross-entity atomicity.
//!
//! # Concurrency Contract
//!
//! Implementations MUST provide per-entity read-then-write atomicity through
//! the version token: `get` returns the record with its current version and
//! `put`/`remove` succeed only if the stored version still equals the one the
//! caller read. A stale write fails with [`StoreError::Conflict`] and leaves
//! the record untouched. Without this, two concurrent associations on the
//! same free spid could both pass validation and the last writer would win.
//!
//! Versions order writes to one record only. A reader that fetches a user
//! and a spid while another request sits between its two writes observes a
//! one-sided pair; the coordinator reports it and leaves it alone.
//!
//! # Invariants
//!
//! - A successful `put` returns a version strictly greater than the one read
//! - `insert` of an existing identifier fails with `AlreadyExists`
//! - Users and spids live in separate keyspaces

mod chaotic;
mod memory;

use std::sync::Arc;

pub use chaotic::ChaoticStore;
pub use memory::MemoryStore;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entity::{EntityKind, Spid, User},
    ids::{SpidId, UserId},
};

/// Optimistic concurrency token.
pub type Version = u64;

/// A record together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// Record contents.
    pub record: T,
    /// Version at read time.
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Pair a record with its version.
    pub fn new(record: T, version: Version) -> Self {
        Self { record, version }
    }
}

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record with this identifier.
    #[error("{kind} with id `{id}` not found")]
    NotFound {
        /// Entity kind.
        kind: EntityKind,
        /// Requested identifier.
        id: Uuid,
    },

    /// Insert of an identifier that is already present.
    #[error("{kind} with id `{id}` already exists")]
    AlreadyExists {
        /// Entity kind.
        kind: EntityKind,
        /// Conflicting identifier.
        id: Uuid,
    },

    /// Record changed since it was read.
    #[error("version conflict on {kind} `{id}`: expected {expected}, found {actual}")]
    Conflict {
        /// Entity kind.
        kind: EntityKind,
        /// Record identifier.
        id: Uuid,
        /// Version the caller read.
        expected: Version,
        /// Version currently stored.
        actual: Version,
    },

    /// Backend failure (I/O, connectivity, injected fault).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage for users and spids.
///
/// Methods are synchronous; an implementation backed by a remote database
/// must bound its own latency and report failure rather than block forever.
pub trait EntityStore: Send + Sync {
    /// Read a user.
    fn get_user(&self, id: UserId) -> Result<Versioned<User>, StoreError>;

    /// Read a spid.
    fn get_spid(&self, id: SpidId) -> Result<Versioned<Spid>, StoreError>;

    /// Overwrite a user read at `expected`. Returns the new version.
    fn put_user(&self, user: &User, expected: Version) -> Result<Version, StoreError>;

    /// Overwrite a spid read at `expected`. Returns the new version.
    fn put_spid(&self, spid: &Spid, expected: Version) -> Result<Version, StoreError>;

    /// Create a user. Returns its initial version.
    fn insert_user(&self, user: &User) -> Result<Version, StoreError>;

    /// Create a spid. Returns its initial version.
    fn insert_spid(&self, spid: &Spid) -> Result<Version, StoreError>;

    /// Delete a user read at `expected`.
    fn remove_user(&self, id: UserId, expected: Version) -> Result<(), StoreError>;

    /// Delete a spid read at `expected`.
    fn remove_spid(&self, id: SpidId, expected: Version) -> Result<(), StoreError>;
}

impl<S: EntityStore + ?Sized> EntityStore for Arc<S> {
    fn get_user(&self, id: UserId) -> Result<Versioned<User>, StoreError> {
        (**self).get_user(id)
    }

    fn get_spid(&self, id: SpidId) -> Result<Versioned<Spid>, StoreError> {
        (**self).get_spid(id)
    }

    fn put_user(&self, user: &User, expected: Version) -> Result<Version, StoreError> {
        (**self).put_user(user, expected)
    }

    fn put_spid(&self, spid: &Spid, expected: Version) -> Result<Version, StoreError> {
        (**self).put_spid(spid, expected)
    }

    fn insert_user(&self, user: &User) -> Result<Version, StoreError> {
        (**self).insert_user(user)
    }

    fn insert_spid(&self, spid: &Spid) -> Result<Version, StoreError> {
        (**self).insert_spid(spid)
    }

    fn remove_user(&self, id: UserId, expected: Version) -> Result<(), StoreError> {
        (**self).remove_user(id, expected)
    }

    fn remove_spid(&self, id: SpidId, expected: Version) -> Result<(), StoreError> {
        (**self).remove_spid(id, expected)
    }
}
