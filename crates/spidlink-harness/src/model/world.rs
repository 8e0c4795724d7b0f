//! Model world - the pairing oracle.
//!
//! Holds one reference slot per user and per spid and applies operations
//! following the protocol rules, including the exact record state each
//! [`FaultPlan`] leaves behind.

use super::operation::{
    ExpectedError, FaultPlan, ModelLock, ModelSpidId, ModelUserId, Operation, OperationResult,
};

/// Observable state for oracle comparison.
///
/// This is the subset of world state that can be compared against the real
/// store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Per-user paired spid.
    pub users: Vec<Option<ModelSpidId>>,
    /// Per-spid paired user and lock state.
    pub spids: Vec<(Option<ModelUserId>, ModelLock)>,
}

impl ObservableState {
    /// `(user, spid)` pairs where exactly one side references the other.
    pub fn one_sided_pairs(&self) -> Vec<(ModelUserId, ModelSpidId)> {
        let mut broken = Vec::new();

        for (u, current) in (0u8..).zip(&self.users) {
            if let Some(s) = *current {
                let back = self.spids.get(usize::from(s)).and_then(|(user, _)| *user);
                if back != Some(u) {
                    broken.push((u, s));
                }
            }
        }

        for (s, (current, _)) in (0u8..).zip(&self.spids) {
            if let Some(u) = *current {
                let back = self.users.get(usize::from(u)).copied().flatten();
                if back != Some(s) {
                    broken.push((u, s));
                }
            }
        }

        broken.sort_unstable();
        broken.dedup();
        broken
    }

    /// Check the pairing invariant over every user and spid.
    pub fn is_consistent(&self) -> bool {
        self.one_sided_pairs().is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct ModelSpid {
    user: Option<ModelUserId>,
    lock: ModelLock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Mutual,
    Unrelated,
    OneSided,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    users: Vec<Option<ModelSpidId>>,
    spids: Vec<ModelSpid>,
    strict_locks: bool,
}

impl ModelWorld {
    /// Create a world of free users and free, locked spids.
    pub fn new(num_users: usize, num_spids: usize) -> Self {
        Self {
            users: vec![None; num_users],
            spids: vec![ModelSpid { user: None, lock: ModelLock::Locked }; num_spids],
            strict_locks: false,
        }
    }

    /// Reject same-state lock requests instead of accepting them.
    pub fn with_strict_locks(mut self) -> Self {
        self.strict_locks = true;
        self
    }

    /// Number of users.
    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    /// Number of spids.
    pub fn num_spids(&self) -> usize {
        self.spids.len()
    }

    /// Apply an operation and return the result.
    ///
    /// Operations must be clamped to this world's size first.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = match *op {
            Operation::Associate { user, spid, fault } => self.associate(user, spid, fault),
            Operation::Dissociate { user, fault } => self.dissociate(user, fault),
            Operation::QuerySpid { user, spid } => self.require_mutual(user, spid),
            Operation::ChangeLock { user, spid, state, fault } => {
                self.change_lock(user, spid, state, fault)
            },
        };

        match result {
            Ok(()) => OperationResult::Ok,
            Err(e) => OperationResult::Error(e),
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            users: self.users.clone(),
            spids: self.spids.iter().map(|s| (s.user, s.lock)).collect(),
        }
    }

    fn user_ref(&self, user: ModelUserId) -> Option<ModelSpidId> {
        self.users.get(usize::from(user)).copied().flatten()
    }

    fn spid_ref(&self, spid: ModelSpidId) -> Option<ModelUserId> {
        self.spids.get(usize::from(spid)).and_then(|s| s.user)
    }

    fn set_user(&mut self, user: ModelUserId, value: Option<ModelSpidId>) {
        if let Some(slot) = self.users.get_mut(usize::from(user)) {
            *slot = value;
        }
    }

    fn set_spid(&mut self, spid: ModelSpidId, value: Option<ModelUserId>) {
        if let Some(slot) = self.spids.get_mut(usize::from(spid)) {
            slot.user = value;
        }
    }

    fn status(&self, user: ModelUserId, spid: ModelSpidId) -> Status {
        match (self.user_ref(user) == Some(spid), self.spid_ref(spid) == Some(user)) {
            (true, true) => Status::Mutual,
            (false, false) => Status::Unrelated,
            _ => Status::OneSided,
        }
    }

    fn require_mutual(&self, user: ModelUserId, spid: ModelSpidId) -> Result<(), ExpectedError> {
        match self.status(user, spid) {
            Status::Mutual => Ok(()),
            Status::Unrelated => Err(ExpectedError::NotPaired),
            Status::OneSided => Err(ExpectedError::FatalInconsistency),
        }
    }

    fn associate(
        &mut self,
        user: ModelUserId,
        spid: ModelSpidId,
        fault: FaultPlan,
    ) -> Result<(), ExpectedError> {
        if self.user_ref(user).is_some() || self.spid_ref(spid).is_some() {
            return Err(ExpectedError::AlreadyPaired);
        }

        match fault {
            FaultPlan::None => {
                self.set_user(user, Some(spid));
                self.set_spid(spid, Some(user));
                Ok(())
            },
            FaultPlan::FirstWrite | FaultPlan::SecondWrite => Err(ExpectedError::WriteFailed),
            FaultPlan::SecondAndCompensation => {
                self.set_user(user, Some(spid));
                Err(ExpectedError::FatalInconsistency)
            },
        }
    }

    fn dissociate(&mut self, user: ModelUserId, fault: FaultPlan) -> Result<(), ExpectedError> {
        let spid = self.user_ref(user).ok_or(ExpectedError::NotPaired)?;
        if self.spid_ref(spid) != Some(user) {
            return Err(ExpectedError::FatalInconsistency);
        }

        match fault {
            FaultPlan::None => {
                self.set_user(user, None);
                self.set_spid(spid, None);
                Ok(())
            },
            FaultPlan::FirstWrite | FaultPlan::SecondWrite => Err(ExpectedError::WriteFailed),
            FaultPlan::SecondAndCompensation => {
                self.set_user(user, None);
                Err(ExpectedError::FatalInconsistency)
            },
        }
    }

    fn change_lock(
        &mut self,
        user: ModelUserId,
        spid: ModelSpidId,
        state: ModelLock,
        fault: FaultPlan,
    ) -> Result<(), ExpectedError> {
        self.require_mutual(user, spid)?;

        let Some(slot) = self.spids.get_mut(usize::from(spid)) else {
            return Err(ExpectedError::NotPaired);
        };

        if slot.lock == state {
            return if self.strict_locks { Err(ExpectedError::InvalidTransition) } else { Ok(()) };
        }

        if fault == FaultPlan::FirstWrite {
            return Err(ExpectedError::WriteFailed);
        }

        slot.lock = state;
        Ok(())
    }
}
