//! In-memory entity store.

use std::{collections::HashMap, hash::Hash, sync::RwLock};

use uuid::Uuid;

use super::{EntityStore, StoreError, Version, Versioned};
use crate::{
    entity::{EntityKind, Spid, User},
    ids::{SpidId, UserId},
};

/// One keyspace of versioned records.
#[derive(Debug)]
struct Table<K, T> {
    kind: EntityKind,
    rows: RwLock<HashMap<K, Versioned<T>>>,
}

impl<K, T> Table<K, T>
where
    K: Copy + Eq + Hash,
    T: Clone,
{
    fn new(kind: EntityKind) -> Self {
        Self { kind, rows: RwLock::new(HashMap::new()) }
    }

    fn poisoned(&self) -> StoreError {
        StoreError::Unavailable(format!("{} table lock poisoned", self.kind))
    }

    fn get(&self, key: K, id: Uuid) -> Result<Versioned<T>, StoreError> {
        let rows = self.rows.read().map_err(|_| self.poisoned())?;
        rows.get(&key).cloned().ok_or(StoreError::NotFound { kind: self.kind, id })
    }

    fn put(&self, key: K, id: Uuid, record: &T, expected: Version) -> Result<Version, StoreError> {
        let mut rows = self.rows.write().map_err(|_| self.poisoned())?;
        let row = rows.get_mut(&key).ok_or(StoreError::NotFound { kind: self.kind, id })?;

        if row.version != expected {
            return Err(StoreError::Conflict {
                kind: self.kind,
                id,
                expected,
                actual: row.version,
            });
        }

        row.record = record.clone();
        row.version += 1;
        Ok(row.version)
    }

    fn insert(&self, key: K, id: Uuid, record: &T) -> Result<Version, StoreError> {
        let mut rows = self.rows.write().map_err(|_| self.poisoned())?;
        if rows.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: self.kind, id });
        }

        rows.insert(key, Versioned::new(record.clone(), 1));
        Ok(1)
    }

    fn remove(&self, key: K, id: Uuid, expected: Version) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| self.poisoned())?;
        let actual = rows
            .get(&key)
            .map(|row| row.version)
            .ok_or(StoreError::NotFound { kind: self.kind, id })?;

        if actual != expected {
            return Err(StoreError::Conflict { kind: self.kind, id, expected, actual });
        }

        rows.remove(&key);
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }
}

/// In-memory store for tests and single-node deployments.
///
/// Each keyspace sits behind its own `RwLock`; version checks happen under
/// the write lock, which gives the per-entity atomicity the protocol needs.
/// Nothing survives a restart.
#[derive(Debug)]
pub struct MemoryStore {
    users: Table<UserId, User>,
    spids: Table<SpidId, Spid>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self { users: Table::new(EntityKind::User), spids: Table::new(EntityKind::Spid) }
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of stored spids.
    pub fn spid_count(&self) -> usize {
        self.spids.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore for MemoryStore {
    fn get_user(&self, id: UserId) -> Result<Versioned<User>, StoreError> {
        self.users.get(id, id.as_uuid())
    }

    fn get_spid(&self, id: SpidId) -> Result<Versioned<Spid>, StoreError> {
        self.spids.get(id, id.as_uuid())
    }

    fn put_user(&self, user: &User, expected: Version) -> Result<Version, StoreError> {
        self.users.put(user.id, user.id.as_uuid(), user, expected)
    }

    fn put_spid(&self, spid: &Spid, expected: Version) -> Result<Version, StoreError> {
        self.spids.put(spid.id, spid.id.as_uuid(), spid, expected)
    }

    fn insert_user(&self, user: &User) -> Result<Version, StoreError> {
        self.users.insert(user.id, user.id.as_uuid(), user)
    }

    fn insert_spid(&self, spid: &Spid) -> Result<Version, StoreError> {
        self.spids.insert(spid.id, spid.id.as_uuid(), spid)
    }

    fn remove_user(&self, id: UserId, expected: Version) -> Result<(), StoreError> {
        self.users.remove(id, id.as_uuid(), expected)
    }

    fn remove_spid(&self, id: SpidId, expected: Version) -> Result<(), StoreError> {
        self.spids.remove(id, id.as_uuid(), expected)
    }
}
