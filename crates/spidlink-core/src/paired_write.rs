//! Two-entity write with single-step compensation.
//!
//! Applies a forward mutation to a user and a spid, then writes the user
//! followed by the spid. If the spid write fails, a compensating mutation is
//! applied to the already-written user and written back.
//!
//! ```text
//! put(user') ──fail──► FirstWrite            (nothing changed)
//!     │
//!     ▼
//! put(spid') ──ok────► Ok
//!     │
//!    fail
//!     ▼
//! put(undo(user')) ──ok───► SecondWrite      (compensated)
//!                  └─fail─► CompensationFailed (one-sided reference persisted)
//! ```
//!
//! The user is always written first so that the undo is always a user write.

use thiserror::Error;

use crate::{
    entity::{Spid, User},
    store::{EntityStore, StoreError, Versioned},
};

/// Failure of a paired write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairedWriteError {
    /// User write failed; store untouched.
    #[error("user write failed: {0}")]
    FirstWrite(StoreError),

    /// Spid write failed; user write undone.
    #[error("spid write failed: {0}")]
    SecondWrite(StoreError),

    /// Spid write failed and so did the undo.
    #[error("spid write failed: {write}; compensation failed: {compensation}")]
    CompensationFailed {
        /// Failure of the spid write.
        write: StoreError,
        /// Failure of the compensating user write.
        compensation: StoreError,
    },
}

/// Write `user` then `spid` after applying `forward` to both.
///
/// `compensate` receives the user as written by the forward step and must
/// restore the fields `forward` changed. On success, returns both records
/// with their new versions.
pub fn paired_write<S, F, C>(
    store: &S,
    user: Versioned<User>,
    spid: Versioned<Spid>,
    forward: F,
    compensate: C,
) -> Result<(Versioned<User>, Versioned<Spid>), PairedWriteError>
where
    S: EntityStore + ?Sized,
    F: FnOnce(&mut User, &mut Spid),
    C: FnOnce(&mut User),
{
    let Versioned { record: mut next_user, version: user_version } = user;
    let Versioned { record: mut next_spid, version: spid_version } = spid;

    forward(&mut next_user, &mut next_spid);

    let user_version =
        store.put_user(&next_user, user_version).map_err(PairedWriteError::FirstWrite)?;

    match store.put_spid(&next_spid, spid_version) {
        Ok(spid_version) => {
            Ok((Versioned::new(next_user, user_version), Versioned::new(next_spid, spid_version)))
        },
        Err(write) => {
            tracing::warn!(
                user_id = %next_user.id,
                spid_id = %next_spid.id,
                error = %write,
                "spid write failed, compensating user write"
            );

            let mut undo = next_user;
            compensate(&mut undo);

            match store.put_user(&undo, user_version) {
                Ok(_) => Err(PairedWriteError::SecondWrite(write)),
                Err(compensation) => {
                    Err(PairedWriteError::CompensationFailed { write, compensation })
                },
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        entity::Position,
        ids::{SpidId, UserId},
        store::{ChaoticStore, MemoryStore},
    };

    fn seeded() -> (ChaoticStore<MemoryStore>, UserId, SpidId) {
        let store = ChaoticStore::new(MemoryStore::new());
        let user_id = UserId::new(Uuid::from_u128(1)).unwrap();
        let spid_id = SpidId::new(Uuid::from_u128(2)).unwrap();
        store.insert_user(&User::new(user_id, "ada", Position::default())).unwrap();
        store.insert_spid(&Spid::new(spid_id, 90, Position::default())).unwrap();
        (store, user_id, spid_id)
    }

    fn pair_up(
        store: &ChaoticStore<MemoryStore>,
        user_id: UserId,
        spid_id: SpidId,
    ) -> Result<(), PairedWriteError> {
        let user = store.get_user(user_id).unwrap();
        let spid = store.get_spid(spid_id).unwrap();

        paired_write(
            store,
            user,
            spid,
            |u, s| {
                u.current_spid = Some(s.id);
                s.current_user = Some(u.id);
            },
            |u| u.current_spid = None,
        )
        .map(|_| ())
    }

    #[test]
    fn both_writes_succeed() {
        let (store, user_id, spid_id) = seeded();

        pair_up(&store, user_id, spid_id).unwrap();

        let user = store.get_user(user_id).unwrap();
        let spid = store.get_spid(spid_id).unwrap();
        assert_eq!(user.record.current_spid, Some(spid_id));
        assert_eq!(spid.record.current_user, Some(user_id));
        assert_eq!((user.version, spid.version), (2, 2));
    }

    #[test]
    fn first_write_failure_touches_nothing() {
        let (store, user_id, spid_id) = seeded();
        store.fail_puts_after(0, 1);

        let err = pair_up(&store, user_id, spid_id).unwrap_err();
        assert!(matches!(err, PairedWriteError::FirstWrite(StoreError::Unavailable(_))));
        assert_eq!(store.put_calls(), 1, "no write after the first failure");

        assert_eq!(store.get_user(user_id).unwrap().version, 1);
        assert_eq!(store.get_spid(spid_id).unwrap().version, 1);
    }

    #[test]
    fn second_write_failure_is_compensated() {
        let (store, user_id, spid_id) = seeded();
        store.fail_puts_after(1, 1);

        let err = pair_up(&store, user_id, spid_id).unwrap_err();
        assert!(matches!(err, PairedWriteError::SecondWrite(_)));
        assert_eq!(store.put_calls(), 3);

        let user = store.get_user(user_id).unwrap();
        assert_eq!(user.record.current_spid, None);
        assert_eq!(user.version, 3, "forward write plus compensating write");
        assert_eq!(store.get_spid(spid_id).unwrap().record.current_user, None);
    }

    #[test]
    fn failed_compensation_leaves_one_sided_reference() {
        let (store, user_id, spid_id) = seeded();
        store.fail_puts_after(1, 2);

        let err = pair_up(&store, user_id, spid_id).unwrap_err();
        assert!(matches!(err, PairedWriteError::CompensationFailed { .. }));

        assert_eq!(store.get_user(user_id).unwrap().record.current_spid, Some(spid_id));
        assert_eq!(store.get_spid(spid_id).unwrap().record.current_user, None);
    }
}
