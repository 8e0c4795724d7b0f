//! Operations for model-based testing.
//!
//! Operations represent all possible protocol requests. They are generated
//! randomly (by proptest or `arbitrary`) and applied to both the model and the
//! real coordinator.

use arbitrary::Arbitrary;

/// User index (0-indexed, mapped to a UUID in the real system).
pub type ModelUserId = u8;

/// Spid index (0-indexed, mapped to a UUID in the real system).
pub type ModelSpidId = u8;

/// Lock state as seen by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum ModelLock {
    /// Locked.
    Locked,
    /// Unlocked.
    Unlocked,
}

/// Store writes to fail while an operation runs.
///
/// Ordinals count the writes of the operation itself: the association and
/// dissociation write the user first, then the spid, then (on failure) undo
/// the user. A lock change writes only the spid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Arbitrary)]
pub enum FaultPlan {
    /// No failures.
    #[default]
    None,
    /// Fail the first write.
    FirstWrite,
    /// Fail the second write; the compensation succeeds.
    SecondWrite,
    /// Fail the second write and the compensating write.
    SecondAndCompensation,
}

impl FaultPlan {
    /// `(skip, count)` for `ChaoticStore::fail_puts_after`, if any.
    pub fn script(self) -> Option<(u64, u64)> {
        match self {
            Self::None => None,
            Self::FirstWrite => Some((0, 1)),
            Self::SecondWrite => Some((1, 1)),
            Self::SecondAndCompensation => Some((1, 2)),
        }
    }
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// User claims a spid.
    Associate {
        /// Requesting user.
        user: ModelUserId,
        /// Spid to claim.
        spid: ModelSpidId,
        /// Injected store failures.
        fault: FaultPlan,
    },

    /// User releases its spid.
    Dissociate {
        /// Requesting user.
        user: ModelUserId,
        /// Injected store failures.
        fault: FaultPlan,
    },

    /// User reads its paired spid.
    QuerySpid {
        /// Requesting user.
        user: ModelUserId,
        /// Spid to read.
        spid: ModelSpidId,
    },

    /// User changes the lock on its paired spid.
    ChangeLock {
        /// Requesting user.
        user: ModelUserId,
        /// Target spid.
        spid: ModelSpidId,
        /// Requested state.
        state: ModelLock,
        /// Injected store failures.
        fault: FaultPlan,
    },
}

impl Operation {
    /// Map indices into `0..users` and `0..spids`.
    pub fn clamp(self, users: usize, spids: usize) -> Self {
        let u = |id: ModelUserId| clamp_index(id, users);
        let s = |id: ModelSpidId| clamp_index(id, spids);

        match self {
            Self::Associate { user, spid, fault } => {
                Self::Associate { user: u(user), spid: s(spid), fault }
            },
            Self::Dissociate { user, fault } => Self::Dissociate { user: u(user), fault },
            Self::QuerySpid { user, spid } => Self::QuerySpid { user: u(user), spid: s(spid) },
            Self::ChangeLock { user, spid, state, fault } => {
                Self::ChangeLock { user: u(user), spid: s(spid), state, fault }
            },
        }
    }

    /// Faults scheduled for this operation.
    pub fn fault(&self) -> FaultPlan {
        match self {
            Self::Associate { fault, .. }
            | Self::Dissociate { fault, .. }
            | Self::ChangeLock { fault, .. } => *fault,
            Self::QuerySpid { .. } => FaultPlan::None,
        }
    }
}

fn clamp_index(id: u8, len: usize) -> u8 {
    match u8::try_from(len) {
        Ok(0) => 0,
        Ok(len) => id % len,
        Err(_) => id,
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(ExpectedError),
}

/// Errors the protocol can report for in-range operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedError {
    /// User or spid already holds a pairing.
    AlreadyPaired,
    /// No pairing between the entities.
    NotPaired,
    /// Lock request rejected.
    InvalidTransition,
    /// A write failed; state unchanged.
    WriteFailed,
    /// One-sided pairing detected or left behind.
    FatalInconsistency,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}
