//! Association protocol errors.
//!
//! [`AssociationError`] is the protocol taxonomy. Every public operation
//! wraps it in an [`OperationError`] naming the operation that failed, so the
//! rendered message reads `failed to <operation>: <cause>`.

use std::fmt;

use spidlink_proto::Request;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entity::EntityKind,
    ids::{SpidId, UserId},
    lock::TransitionError,
    store::StoreError,
};

/// Ways stored pairing data can disagree with itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Inconsistency {
    /// User references the spid, spid references someone else (or nobody).
    #[error("user points to spid but spid points to {}", describe(.spid_user))]
    UserSideOnly {
        /// What the spid actually references.
        spid_user: Option<UserId>,
    },

    /// Spid references the user, user references something else (or nothing).
    #[error("spid points to user but user points to {}", describe(.user_spid))]
    SpidSideOnly {
        /// What the user actually references.
        user_spid: Option<SpidId>,
    },

    /// User references a spid that does not exist.
    #[error("user points to a spid that does not exist")]
    MissingSpid,

    /// The second write failed and so did the undo of the first.
    #[error("failed to rollback `{write}`, `{compensation}`")]
    CompensationFailed {
        /// Failure of the second write.
        write: StoreError,
        /// Failure of the compensating write.
        compensation: StoreError,
    },
}

impl Inconsistency {
    /// Whether a concurrent association or dissociation between its two
    /// writes would produce the same observation.
    ///
    /// One-sided references read from the store match the window between the
    /// user write and the spid write. A failed compensation or a missing spid
    /// is never transient.
    pub fn may_be_in_flight(&self) -> bool {
        matches!(self, Self::UserSideOnly { .. } | Self::SpidSideOnly { .. })
    }
}

fn describe<T: fmt::Display>(reference: &Option<T>) -> String {
    reference.as_ref().map_or_else(|| "nothing".to_string(), |id| format!("`{id}`"))
}

fn describe_target(spid_id: &Option<SpidId>) -> String {
    spid_id.map_or_else(|| "any spids".to_string(), |spid| format!("spid with id `{spid}`"))
}

/// Protocol-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssociationError {
    /// Referenced user or spid does not exist.
    #[error("{kind} with id `{id}` not found")]
    NotFound {
        /// Kind of the missing entity.
        kind: EntityKind,
        /// Requested identifier.
        id: Uuid,
    },

    /// Entity already exists (remote user replication).
    #[error("{kind} with id `{id}` already exists")]
    AlreadyExists {
        /// Kind of the entity.
        kind: EntityKind,
        /// Conflicting identifier.
        id: Uuid,
    },

    /// Entity already holds a pairing.
    #[error("{kind} is already associated to {} with id `{counterpart}`", counterpart_kind(.kind))]
    AlreadyPaired {
        /// Kind of the entity that is already paired.
        kind: EntityKind,
        /// Its identifier.
        id: Uuid,
        /// The entity it is paired with.
        counterpart: Uuid,
    },

    /// No pairing exists.
    #[error("user with id `{user_id}` not associated to {}", describe_target(.spid_id))]
    NotPaired {
        /// Requesting user.
        user_id: UserId,
        /// Spid the request named, if any.
        spid_id: Option<SpidId>,
    },

    /// Lock change rejected.
    #[error("invalid lock transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    /// Battery level outside 0..=100.
    #[error("battery level {0} out of range")]
    InvalidBattery(u8),

    /// A store read failed for a reason other than absence.
    #[error("read failed: {0}")]
    ReadFailed(StoreError),

    /// A store write failed; state is unchanged or fully compensated.
    #[error("write failed: {0}")]
    WriteFailed(StoreError),

    /// Stored pairing data disagrees and will not be repaired automatically.
    #[error("inconsistent pairing between user `{user_id}` and spid `{spid_id}`: {reason}")]
    FatalInconsistency {
        /// User side of the broken pair.
        user_id: UserId,
        /// Spid side of the broken pair.
        spid_id: SpidId,
        /// What disagrees.
        reason: Inconsistency,
    },
}

fn counterpart_kind(kind: &EntityKind) -> EntityKind {
    match kind {
        EntityKind::User => EntityKind::Spid,
        EntityKind::Spid => EntityKind::User,
    }
}

impl AssociationError {
    /// Returns true if this error needs operator intervention.
    ///
    /// Fatal errors mean the store holds a one-sided pairing. Everything else
    /// leaves the store consistent.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalInconsistency { .. })
    }

    /// Returns true if repeating the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ReadFailed(_) | Self::WriteFailed(_) => true,

            Self::NotFound { .. }
            | Self::AlreadyExists { .. }
            | Self::AlreadyPaired { .. }
            | Self::NotPaired { .. }
            | Self::InvalidTransition(_)
            | Self::InvalidBattery(_)
            | Self::FatalInconsistency { .. } => false,
        }
    }
}

/// Public operations, named as they appear in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Pair a user with a spid.
    Associate,
    /// Release a pairing.
    Dissociate,
    /// Read the paired spid.
    QuerySpidInfo,
    /// Change the paired spid's lock.
    ChangeLock,
    /// Fetch a user.
    GetUser,
    /// Register a user.
    RegisterUser,
    /// Update a user's position.
    UpdateUser,
    /// Delete a user.
    DeleteUser,
    /// Fetch a spid.
    GetSpid,
    /// Register a spid.
    RegisterSpid,
    /// Update a spid's telemetry.
    UpdateSpid,
    /// Delete a spid.
    DeleteSpid,
    /// Store a replicated user.
    AddRemoteUser,
    /// Overwrite a replicated user.
    UpdateRemoteUser,
    /// Remove a replicated user.
    RemoveRemoteUser,
}

impl Operation {
    /// Operation a request invokes.
    pub fn of(request: &Request) -> Self {
        match request {
            Request::GetUser { .. } => Self::GetUser,
            Request::RegisterUser { .. } => Self::RegisterUser,
            Request::UpdateUser { .. } => Self::UpdateUser,
            Request::DeleteUser { .. } => Self::DeleteUser,
            Request::GetSpid { .. } => Self::GetSpid,
            Request::RegisterSpid { .. } => Self::RegisterSpid,
            Request::UpdateSpid { .. } => Self::UpdateSpid,
            Request::DeleteSpid { .. } => Self::DeleteSpid,
            Request::RequestAssociation { .. } => Self::Associate,
            Request::RequestDissociation { .. } => Self::Dissociate,
            Request::RequestSpidInfo { .. } => Self::QuerySpidInfo,
            Request::RequestLockChange { .. } => Self::ChangeLock,
            Request::AddRemoteUser { .. } => Self::AddRemoteUser,
            Request::UpdateRemoteUser { .. } => Self::UpdateRemoteUser,
            Request::RemoveRemoteUser { .. } => Self::RemoveRemoteUser,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Associate => "request association",
            Self::Dissociate => "request dissociation",
            Self::QuerySpidInfo => "request spid info",
            Self::ChangeLock => "request lock change",
            Self::GetUser => "get user info",
            Self::RegisterUser => "register user",
            Self::UpdateUser => "update user",
            Self::DeleteUser => "delete user",
            Self::GetSpid => "get spid info",
            Self::RegisterSpid => "register spid",
            Self::UpdateSpid => "update spid",
            Self::DeleteSpid => "delete spid",
            Self::AddRemoteUser => "add remote user",
            Self::UpdateRemoteUser => "update remote user",
            Self::RemoveRemoteUser => "remove remote user",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An [`AssociationError`] tagged with the operation it aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to {operation}: {source}")]
pub struct OperationError {
    /// Failed operation.
    pub operation: Operation,
    /// Underlying cause.
    pub source: AssociationError,
}

impl OperationError {
    /// Wrap `source` with `operation`.
    pub fn new(operation: Operation, source: AssociationError) -> Self {
        Self { operation, source }
    }

    /// Returns true if the cause is a fatal inconsistency.
    pub fn is_fatal(&self) -> bool {
        self.source.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_id() -> UserId {
        UserId::parse("6f1c8a4e-2b1d-4c55-9a0e-0d1f2e3c4b5a").unwrap()
    }

    fn spid_id() -> SpidId {
        SpidId::parse("0a9b8c7d-6e5f-4a3b-8c2d-1e0f9a8b7c6d").unwrap()
    }

    #[test]
    fn operation_prefix_in_display() {
        let err = OperationError::new(
            Operation::Dissociate,
            AssociationError::NotPaired { user_id: user_id(), spid_id: None },
        );
        assert_eq!(
            err.to_string(),
            "failed to request dissociation: user with id \
             `6f1c8a4e-2b1d-4c55-9a0e-0d1f2e3c4b5a` not associated to any spids"
        );
    }

    #[test]
    fn already_paired_names_counterpart() {
        let err = AssociationError::AlreadyPaired {
            kind: EntityKind::Spid,
            id: spid_id().as_uuid(),
            counterpart: user_id().as_uuid(),
        };
        assert_eq!(
            err.to_string(),
            "spid is already associated to user with id `6f1c8a4e-2b1d-4c55-9a0e-0d1f2e3c4b5a`"
        );
    }

    #[test]
    fn fatal_inconsistency_is_fatal_and_not_retryable() {
        let err = AssociationError::FatalInconsistency {
            user_id: user_id(),
            spid_id: spid_id(),
            reason: Inconsistency::UserSideOnly { spid_user: None },
        };
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert!(err.to_string().ends_with("user points to spid but spid points to nothing"));
    }

    #[test]
    fn only_one_sided_reads_may_be_in_flight() {
        let failure = || StoreError::Unavailable("down".to_string());

        assert!(Inconsistency::UserSideOnly { spid_user: None }.may_be_in_flight());
        assert!(Inconsistency::SpidSideOnly { user_spid: None }.may_be_in_flight());
        assert!(!Inconsistency::MissingSpid.may_be_in_flight());
        assert!(
            !Inconsistency::CompensationFailed { write: failure(), compensation: failure() }
                .may_be_in_flight()
        );
    }

    #[test]
    fn write_failed_is_retryable() {
        let err = AssociationError::WriteFailed(StoreError::Unavailable("disk full".to_string()));
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn operation_of_request() {
        let request = Request::RequestLockChange {
            user_id: String::new(),
            spid_id: String::new(),
            lock_state: spidlink_proto::WireLockState::LOCKED,
        };
        assert_eq!(Operation::of(&request), Operation::ChangeLock);
        assert_eq!(Operation::ChangeLock.to_string(), "request lock change");
    }
}
