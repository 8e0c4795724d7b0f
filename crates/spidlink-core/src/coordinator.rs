//! Association Coordinator
//!
//! Orchestrates the read → validate → mutate → write → compensate sequence
//! for the four pairing operations.
//!
//! ## Responsibilities
//!
//! - Associate: create the user ⇄ spid edge
//! - Dissociate: remove it
//! - Query: read the paired spid, guarded by the pairing check
//! - Lock change: single spid write, only for the paired user
//!
//! ## Design
//!
//! - Stateless: holds the store and lock policy only; safe to share across
//!   threads and call concurrently
//! - No locking: per-entity atomicity comes from the store's version token
//! - No retries: the first store failure ends the operation
//! - Detect, never repair: one-sided references are reported as
//!   `FatalInconsistency` and left in place for an operator
//!
//! ## Reads During a Paired Write
//!
//! Associate and dissociate commit the user before the spid. A query, lock
//! change, or dissociate that reads both records between those two writes
//! sees a one-sided reference and reports `FatalInconsistency`, even though
//! the writer leaves the pair consistent moments later. Such reports carry a
//! `UserSideOnly`/`SpidSideOnly` reason and are logged as possibly in flight;
//! only a failed compensation or a missing spid is certain to persist.

use crate::{
    entity::{EntityKind, Spid, User},
    error::{AssociationError, Inconsistency, Operation, OperationError},
    ids::{SpidId, UserId},
    lock::{LockState, LockStateMachine, SameStatePolicy},
    paired_write::{PairedWriteError, paired_write},
    store::{EntityStore, StoreError, Versioned},
    validator,
};

/// Runs the association protocol against an [`EntityStore`].
#[derive(Debug)]
pub struct AssociationCoordinator<S> {
    store: S,
    lock_machine: LockStateMachine,
}

impl<S: EntityStore> AssociationCoordinator<S> {
    /// Create a coordinator that treats same-state lock requests as no-ops.
    pub fn new(store: S) -> Self {
        Self::with_lock_policy(store, SameStatePolicy::default())
    }

    /// Create a coordinator with an explicit same-state lock policy.
    pub fn with_lock_policy(store: S, policy: SameStatePolicy) -> Self {
        Self { store, lock_machine: LockStateMachine::new(policy) }
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Pair `user_id` with `spid_id`. Returns the updated user.
    ///
    /// # Errors
    ///
    /// - `NotFound` if either entity is missing
    /// - `AlreadyPaired` if either side already holds a pairing
    /// - `WriteFailed` if a write failed and the store is unchanged
    /// - `FatalInconsistency` if the undo of the user write also failed
    #[tracing::instrument(skip(self), fields(%user_id, %spid_id))]
    pub fn associate(&self, user_id: UserId, spid_id: SpidId) -> Result<User, OperationError> {
        self.associate_inner(user_id, spid_id)
            .map(|user| {
                tracing::info!("association established");
                user
            })
            .map_err(|e| self.fail(Operation::Associate, e))
    }

    /// Release the pairing held by `user_id`. Returns the updated user.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user is missing
    /// - `NotPaired` if the user holds no pairing
    /// - `FatalInconsistency` if the referenced spid is missing or does not
    ///   point back, or if the undo of the user write failed
    /// - `WriteFailed` if a write failed and the store is unchanged
    #[tracing::instrument(skip(self), fields(%user_id))]
    pub fn dissociate(&self, user_id: UserId) -> Result<User, OperationError> {
        self.dissociate_inner(user_id)
            .map(|user| {
                tracing::info!("association released");
                user
            })
            .map_err(|e| self.fail(Operation::Dissociate, e))
    }

    /// Read the spid paired with `user_id`.
    ///
    /// Read-only: an inconsistency is reported, never fixed.
    #[tracing::instrument(skip(self), fields(%user_id, %spid_id))]
    pub fn query_paired_spid(
        &self,
        user_id: UserId,
        spid_id: SpidId,
    ) -> Result<Spid, OperationError> {
        self.query_inner(user_id, spid_id).map_err(|e| self.fail(Operation::QuerySpidInfo, e))
    }

    /// Move the paired spid's lock to `requested`. Returns the updated spid.
    ///
    /// A no-op transition is not written.
    #[tracing::instrument(skip(self), fields(%user_id, %spid_id, %requested))]
    pub fn change_lock_state(
        &self,
        user_id: UserId,
        spid_id: SpidId,
        requested: LockState,
    ) -> Result<Spid, OperationError> {
        self.change_lock_inner(user_id, spid_id, requested)
            .map_err(|e| self.fail(Operation::ChangeLock, e))
    }

    fn associate_inner(&self, user_id: UserId, spid_id: SpidId) -> Result<User, AssociationError> {
        let user = self.load_user(user_id)?;
        let spid = self.load_spid(spid_id)?;

        validator::can_associate(&user.record, &spid.record)?;

        let (user, _spid) = paired_write(
            &self.store,
            user,
            spid,
            |user, spid| {
                user.current_spid = Some(spid.id);
                spid.current_user = Some(user.id);
            },
            |user| user.current_spid = None,
        )
        .map_err(|e| write_failure(user_id, spid_id, e))?;

        Ok(user.record)
    }

    fn dissociate_inner(&self, user_id: UserId) -> Result<User, AssociationError> {
        let user = self.load_user(user_id)?;
        let spid_id = validator::can_dissociate(&user.record)?;

        let spid = match self.store.get_spid(spid_id) {
            Ok(spid) => spid,
            Err(StoreError::NotFound { .. }) => {
                return Err(AssociationError::FatalInconsistency {
                    user_id,
                    spid_id,
                    reason: Inconsistency::MissingSpid,
                });
            },
            Err(e) => return Err(AssociationError::ReadFailed(e)),
        };

        validator::require_mutual_pairing(&user.record, &spid.record)?;

        let (user, _spid) = paired_write(
            &self.store,
            user,
            spid,
            |user, spid| {
                user.current_spid = None;
                spid.current_user = None;
            },
            move |user| user.current_spid = Some(spid_id),
        )
        .map_err(|e| write_failure(user_id, spid_id, e))?;

        Ok(user.record)
    }

    fn query_inner(&self, user_id: UserId, spid_id: SpidId) -> Result<Spid, AssociationError> {
        let user = self.load_user(user_id)?;
        let spid = self.load_spid(spid_id)?;

        validator::require_mutual_pairing(&user.record, &spid.record)?;

        Ok(spid.record)
    }

    fn change_lock_inner(
        &self,
        user_id: UserId,
        spid_id: SpidId,
        requested: LockState,
    ) -> Result<Spid, AssociationError> {
        let user = self.load_user(user_id)?;
        let Versioned { record: mut spid, version } = self.load_spid(spid_id)?;

        validator::require_mutual_pairing(&user.record, &spid)?;

        let transition = self.lock_machine.apply(spid.lock_state, requested)?;
        if !transition.is_change() {
            tracing::debug!(state = %spid.lock_state, "lock already in requested state");
            return Ok(spid);
        }

        spid.lock_state = transition.state();
        self.store.put_spid(&spid, version).map_err(AssociationError::WriteFailed)?;

        tracing::info!(state = %spid.lock_state, "lock state changed");
        Ok(spid)
    }

    fn load_user(&self, id: UserId) -> Result<Versioned<User>, AssociationError> {
        self.store.get_user(id).map_err(|e| read_failure(EntityKind::User, id.as_uuid(), e))
    }

    fn load_spid(&self, id: SpidId) -> Result<Versioned<Spid>, AssociationError> {
        self.store.get_spid(id).map_err(|e| read_failure(EntityKind::Spid, id.as_uuid(), e))
    }

    /// Log and wrap a failure.
    fn fail(&self, operation: Operation, error: AssociationError) -> OperationError {
        match &error {
            AssociationError::FatalInconsistency { user_id, spid_id, reason }
                if reason.may_be_in_flight() =>
            {
                tracing::error!(
                    %user_id,
                    %spid_id,
                    %reason,
                    operation = %operation,
                    "one-sided pairing observed, reconcile if it persists"
                );
            },
            AssociationError::FatalInconsistency { user_id, spid_id, reason } => {
                tracing::error!(
                    %user_id,
                    %spid_id,
                    %reason,
                    operation = %operation,
                    "pairing data inconsistent, manual reconciliation required"
                );
            },
            AssociationError::ReadFailed(_) | AssociationError::WriteFailed(_) => {
                tracing::warn!(operation = %operation, error = %error, "store failure");
            },
            _ => {
                tracing::debug!(operation = %operation, error = %error, "request rejected");
            },
        }

        OperationError::new(operation, error)
    }
}

fn read_failure(kind: EntityKind, id: uuid::Uuid, error: StoreError) -> AssociationError {
    match error {
        StoreError::NotFound { .. } => AssociationError::NotFound { kind, id },
        other => AssociationError::ReadFailed(other),
    }
}

fn write_failure(user_id: UserId, spid_id: SpidId, error: PairedWriteError) -> AssociationError {
    match error {
        PairedWriteError::FirstWrite(e) | PairedWriteError::SecondWrite(e) => {
            AssociationError::WriteFailed(e)
        },
        PairedWriteError::CompensationFailed { write, compensation } => {
            AssociationError::FatalInconsistency {
                user_id,
                spid_id,
                reason: Inconsistency::CompensationFailed { write, compensation },
            }
        },
    }
}
