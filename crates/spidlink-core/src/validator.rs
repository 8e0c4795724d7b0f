//! Pairing consistency checks.
//!
//! Stateless, side-effect-free predicates over entities that were already
//! fetched. The coordinator calls these before every write; the harness uses
//! [`pairing_invariant_holds`] as its oracle.

use crate::{
    entity::{EntityKind, Spid, User},
    error::{AssociationError, Inconsistency},
    ids::SpidId,
};

/// How a specific user and spid relate to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStatus {
    /// Each references the other.
    Mutual,
    /// Neither references the other.
    Unrelated,
    /// Exactly one references the other: a data-inconsistency fault.
    OneSided(Inconsistency),
}

/// Classify the relationship between `user` and `spid`.
pub fn pairing_status(user: &User, spid: &Spid) -> PairingStatus {
    let user_to_spid = user.current_spid == Some(spid.id);
    let spid_to_user = spid.current_user == Some(user.id);

    match (user_to_spid, spid_to_user) {
        (true, true) => PairingStatus::Mutual,
        (false, false) => PairingStatus::Unrelated,
        (true, false) => {
            PairingStatus::OneSided(Inconsistency::UserSideOnly { spid_user: spid.current_user })
        },
        (false, true) => {
            PairingStatus::OneSided(Inconsistency::SpidSideOnly { user_spid: user.current_spid })
        },
    }
}

/// Check that `user` and `spid` are paired with each other.
pub fn is_mutually_paired(user: &User, spid: &Spid) -> bool {
    pairing_status(user, spid) == PairingStatus::Mutual
}

/// Check the pairing invariant for one user/spid pair.
///
/// `user.current_spid == spid.id` iff `spid.current_user == user.id`.
pub fn pairing_invariant_holds(user: &User, spid: &Spid) -> bool {
    !matches!(pairing_status(user, spid), PairingStatus::OneSided(_))
}

/// Reject association if either side already holds a pairing.
pub fn can_associate(user: &User, spid: &Spid) -> Result<(), AssociationError> {
    if let Some(current) = user.current_spid {
        return Err(AssociationError::AlreadyPaired {
            kind: EntityKind::User,
            id: user.id.as_uuid(),
            counterpart: current.as_uuid(),
        });
    }

    if let Some(current) = spid.current_user {
        return Err(AssociationError::AlreadyPaired {
            kind: EntityKind::Spid,
            id: spid.id.as_uuid(),
            counterpart: current.as_uuid(),
        });
    }

    Ok(())
}

/// Reject dissociation of an unpaired user. Returns the referenced spid.
pub fn can_dissociate(user: &User) -> Result<SpidId, AssociationError> {
    user.current_spid.ok_or(AssociationError::NotPaired { user_id: user.id, spid_id: None })
}

/// Require a mutual pairing before a paired-only operation.
///
/// Unrelated entities yield `NotPaired`; a one-sided reference yields
/// `FatalInconsistency`, which is never repaired here.
pub fn require_mutual_pairing(user: &User, spid: &Spid) -> Result<(), AssociationError> {
    match pairing_status(user, spid) {
        PairingStatus::Mutual => Ok(()),
        PairingStatus::Unrelated => {
            Err(AssociationError::NotPaired { user_id: user.id, spid_id: Some(spid.id) })
        },
        PairingStatus::OneSided(reason) => Err(AssociationError::FatalInconsistency {
            user_id: user.id,
            spid_id: spid.id,
            reason,
        }),
    }
}
