//! Entity registry: registration, lookup, telemetry, and removal.
//!
//! Everything here touches a single record, so none of it needs the paired
//! write. Pairing references and lock state are owned by the
//! [`AssociationCoordinator`](crate::AssociationCoordinator) and are never
//! modified through this surface, except verbatim by the remote user
//! forwarders.

use uuid::Uuid;

use crate::{
    entity::{EntityKind, MAX_BATTERY_LEVEL, Position, Spid, User},
    env::Environment,
    error::{AssociationError, Operation, OperationError},
    ids::{SpidId, UserId},
    store::{EntityStore, StoreError},
};

/// Single-record operations over an [`EntityStore`].
#[derive(Debug)]
pub struct EntityRegistry<S, E> {
    store: S,
    env: E,
}

impl<S: EntityStore, E: Environment> EntityRegistry<S, E> {
    /// Create a registry drawing new identifiers from `env`.
    pub fn new(store: S, env: E) -> Self {
        Self { store, env }
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register an unpaired user under a fresh identifier.
    #[tracing::instrument(skip(self, position))]
    pub fn register_user(&self, name: &str, position: Position) -> Result<User, OperationError> {
        let op = Operation::RegisterUser;
        let id = self.fresh_id(UserId::new);
        let user = User::new(id, name, position);

        self.store.insert_user(&user).map_err(|e| write_error(op, e))?;
        tracing::info!(user_id = %id, "user registered");
        Ok(user)
    }

    /// Register an unpaired, locked spid under a fresh identifier.
    #[tracing::instrument(skip(self, location))]
    pub fn register_spid(
        &self,
        battery_level: u8,
        location: Position,
    ) -> Result<Spid, OperationError> {
        let op = Operation::RegisterSpid;
        check_battery(op, battery_level)?;

        let id = self.fresh_id(SpidId::new);
        let spid = Spid::new(id, battery_level, location);

        self.store.insert_spid(&spid).map_err(|e| write_error(op, e))?;
        tracing::info!(spid_id = %id, "spid registered");
        Ok(spid)
    }

    /// Fetch a user.
    pub fn get_user(&self, id: UserId) -> Result<User, OperationError> {
        self.store
            .get_user(id)
            .map(|v| v.record)
            .map_err(|e| read_error(Operation::GetUser, EntityKind::User, id.as_uuid(), e))
    }

    /// Fetch a spid.
    pub fn get_spid(&self, id: SpidId) -> Result<Spid, OperationError> {
        self.store
            .get_spid(id)
            .map(|v| v.record)
            .map_err(|e| read_error(Operation::GetSpid, EntityKind::Spid, id.as_uuid(), e))
    }

    /// Move a user. Pairing is left untouched.
    #[tracing::instrument(skip(self, position), fields(%id))]
    pub fn update_user_position(
        &self,
        id: UserId,
        position: Position,
    ) -> Result<User, OperationError> {
        let op = Operation::UpdateUser;
        let mut current = self
            .store
            .get_user(id)
            .map_err(|e| read_error(op, EntityKind::User, id.as_uuid(), e))?;

        current.record.position = position;
        self.store.put_user(&current.record, current.version).map_err(|e| write_error(op, e))?;

        tracing::debug!("user position updated");
        Ok(current.record)
    }

    /// Report new battery level and location for a spid.
    ///
    /// Pairing and lock state are left untouched.
    #[tracing::instrument(skip(self, location), fields(%id))]
    pub fn update_spid_telemetry(
        &self,
        id: SpidId,
        battery_level: u8,
        location: Position,
    ) -> Result<Spid, OperationError> {
        let op = Operation::UpdateSpid;
        check_battery(op, battery_level)?;

        let mut current = self
            .store
            .get_spid(id)
            .map_err(|e| read_error(op, EntityKind::Spid, id.as_uuid(), e))?;

        current.record.battery_level = battery_level;
        current.record.location = location;
        self.store.put_spid(&current.record, current.version).map_err(|e| write_error(op, e))?;

        tracing::debug!("spid telemetry updated");
        Ok(current.record)
    }

    /// Delete an unpaired user.
    ///
    /// # Errors
    ///
    /// `AlreadyPaired` while the user holds a pairing.
    #[tracing::instrument(skip(self), fields(%id))]
    pub fn delete_user(&self, id: UserId) -> Result<(), OperationError> {
        let op = Operation::DeleteUser;
        let current = self
            .store
            .get_user(id)
            .map_err(|e| read_error(op, EntityKind::User, id.as_uuid(), e))?;

        if let Some(spid) = current.record.current_spid {
            return Err(reject(
                op,
                AssociationError::AlreadyPaired {
                    kind: EntityKind::User,
                    id: id.as_uuid(),
                    counterpart: spid.as_uuid(),
                },
            ));
        }

        self.store.remove_user(id, current.version).map_err(|e| write_error(op, e))?;
        tracing::info!("user deleted");
        Ok(())
    }

    /// Delete an unpaired spid.
    ///
    /// # Errors
    ///
    /// `AlreadyPaired` while the spid holds a pairing.
    #[tracing::instrument(skip(self), fields(%id))]
    pub fn delete_spid(&self, id: SpidId) -> Result<(), OperationError> {
        let op = Operation::DeleteSpid;
        let current = self
            .store
            .get_spid(id)
            .map_err(|e| read_error(op, EntityKind::Spid, id.as_uuid(), e))?;

        if let Some(user) = current.record.current_user {
            return Err(reject(
                op,
                AssociationError::AlreadyPaired {
                    kind: EntityKind::Spid,
                    id: id.as_uuid(),
                    counterpart: user.as_uuid(),
                },
            ));
        }

        self.store.remove_spid(id, current.version).map_err(|e| write_error(op, e))?;
        tracing::info!("spid deleted");
        Ok(())
    }

    /// Store a user record replicated from another node, as is.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn add_remote_user(&self, user: User) -> Result<User, OperationError> {
        self.store.insert_user(&user).map_err(|e| write_error(Operation::AddRemoteUser, e))?;
        Ok(user)
    }

    /// Overwrite a replicated user record, as is.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn update_remote_user(&self, user: User) -> Result<User, OperationError> {
        let op = Operation::UpdateRemoteUser;
        let current = self
            .store
            .get_user(user.id)
            .map_err(|e| read_error(op, EntityKind::User, user.id.as_uuid(), e))?;

        self.store.put_user(&user, current.version).map_err(|e| write_error(op, e))?;
        Ok(user)
    }

    /// Remove a replicated user record.
    #[tracing::instrument(skip(self), fields(%id))]
    pub fn remove_remote_user(&self, id: UserId) -> Result<(), OperationError> {
        let op = Operation::RemoveRemoteUser;
        let current = self
            .store
            .get_user(id)
            .map_err(|e| read_error(op, EntityKind::User, id.as_uuid(), e))?;

        self.store.remove_user(id, current.version).map_err(|e| write_error(op, e))
    }

    /// Draw identifiers until one is accepted.
    ///
    /// `Environment::new_uuid` never yields nil, so this loops at most once
    /// for well-behaved environments.
    fn fresh_id<T>(&self, make: impl Fn(Uuid) -> Option<T>) -> T {
        loop {
            if let Some(id) = make(self.env.new_uuid()) {
                return id;
            }
        }
    }
}

fn check_battery(op: Operation, battery_level: u8) -> Result<(), OperationError> {
    if battery_level > MAX_BATTERY_LEVEL {
        return Err(reject(op, AssociationError::InvalidBattery(battery_level)));
    }
    Ok(())
}

fn reject(op: Operation, error: AssociationError) -> OperationError {
    tracing::debug!(operation = %op, error = %error, "request rejected");
    OperationError::new(op, error)
}

fn read_error(op: Operation, kind: EntityKind, id: Uuid, error: StoreError) -> OperationError {
    let error = match error {
        StoreError::NotFound { .. } => AssociationError::NotFound { kind, id },
        other => {
            tracing::warn!(operation = %op, error = %other, "store read failed");
            AssociationError::ReadFailed(other)
        },
    };
    OperationError::new(op, error)
}

fn write_error(op: Operation, error: StoreError) -> OperationError {
    let error = match error {
        StoreError::AlreadyExists { kind, id } => AssociationError::AlreadyExists { kind, id },
        StoreError::NotFound { kind, id } => AssociationError::NotFound { kind, id },
        other => {
            tracing::warn!(operation = %op, error = %other, "store write failed");
            AssociationError::WriteFailed(other)
        },
    };
    OperationError::new(op, error)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::{AssociationCoordinator, lock::LockState, store::MemoryStore};

    #[derive(Clone)]
    struct SeededEnv(Arc<Mutex<ChaCha8Rng>>);

    impl Environment for SeededEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            self.0.lock().unwrap().fill_bytes(buffer);
        }
    }

    fn registry() -> EntityRegistry<Arc<MemoryStore>, SeededEnv> {
        let env = SeededEnv(Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(42))));
        EntityRegistry::new(Arc::new(MemoryStore::new()), env)
    }

    fn here() -> Position {
        Position { latitude: 52.52, longitude: 13.405 }
    }

    #[test]
    fn registered_entities_start_free() {
        let registry = registry();

        let user = registry.register_user("ada", here()).unwrap();
        let spid = registry.register_spid(100, here()).unwrap();

        assert!(!user.is_paired());
        assert!(!spid.is_paired());
        assert_eq!(spid.lock_state, LockState::Locked);
        assert_eq!(registry.get_user(user.id).unwrap(), user);
        assert_eq!(registry.get_spid(spid.id).unwrap(), spid);
    }

    #[test]
    fn battery_above_full_is_rejected() {
        let registry = registry();

        let err = registry.register_spid(101, here()).unwrap_err();
        assert_eq!(err.source, AssociationError::InvalidBattery(101));
        assert_eq!(registry.store().spid_count(), 0);
    }

    #[test]
    fn telemetry_update_keeps_pairing_and_lock() {
        let registry = registry();
        let user = registry.register_user("ada", here()).unwrap();
        let spid = registry.register_spid(80, here()).unwrap();

        let coordinator = AssociationCoordinator::new(Arc::clone(registry.store()));
        coordinator.associate(user.id, spid.id).unwrap();
        coordinator.change_lock_state(user.id, spid.id, LockState::Unlocked).unwrap();

        let moved = Position { latitude: 48.85, longitude: 2.35 };
        let updated = registry.update_spid_telemetry(spid.id, 42, moved).unwrap();
        assert_eq!(updated.battery_level, 42);
        assert_eq!(updated.location, moved);
        assert_eq!(updated.current_user, Some(user.id));
        assert_eq!(updated.lock_state, LockState::Unlocked);

        let user = registry.update_user_position(user.id, moved).unwrap();
        assert_eq!(user.current_spid, Some(spid.id));
    }

    #[test]
    fn paired_entities_cannot_be_deleted() {
        let registry = registry();
        let user = registry.register_user("ada", here()).unwrap();
        let spid = registry.register_spid(80, here()).unwrap();
        AssociationCoordinator::new(Arc::clone(registry.store()))
            .associate(user.id, spid.id)
            .unwrap();

        let err = registry.delete_user(user.id).unwrap_err();
        assert!(matches!(
            err.source,
            AssociationError::AlreadyPaired { kind: EntityKind::User, .. }
        ));
        let err = registry.delete_spid(spid.id).unwrap_err();
        assert!(matches!(
            err.source,
            AssociationError::AlreadyPaired { kind: EntityKind::Spid, .. }
        ));

        assert_eq!(registry.store().user_count(), 1);
        assert_eq!(registry.store().spid_count(), 1);
    }

    #[test]
    fn delete_unpaired_then_lookup_fails() {
        let registry = registry();
        let user = registry.register_user("ada", here()).unwrap();

        registry.delete_user(user.id).unwrap();

        let err = registry.get_user(user.id).unwrap_err();
        assert_eq!(err.operation, Operation::GetUser);
        assert_eq!(
            err.source,
            AssociationError::NotFound { kind: EntityKind::User, id: user.id.as_uuid() }
        );
    }

    #[test]
    fn remote_user_lifecycle() {
        let registry = registry();
        let mut remote = User::new(UserId::new(Uuid::from_u128(0xfeed)).unwrap(), "remote", here());

        registry.add_remote_user(remote.clone()).unwrap();
        let err = registry.add_remote_user(remote.clone()).unwrap_err();
        assert!(matches!(
            err.source,
            AssociationError::AlreadyExists { kind: EntityKind::User, .. }
        ));

        remote.name = "renamed".to_string();
        registry.update_remote_user(remote.clone()).unwrap();
        assert_eq!(registry.get_user(remote.id).unwrap().name, "renamed");

        registry.remove_remote_user(remote.id).unwrap();
        let err = registry.remove_remote_user(remote.id).unwrap_err();
        assert!(matches!(err.source, AssociationError::NotFound { .. }));
    }
}
