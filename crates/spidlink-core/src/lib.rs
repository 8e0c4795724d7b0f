//! Spidlink association protocol.
//!
//! Pairs Users with Spids (shared devices with a battery, a location, and a
//! lock) across two independently stored records, without a transaction
//! coordinator.
//!
//! ## Architecture
//!
//! ```text
//! spidlink-core
//!   ├─ AssociationCoordinator  (read → validate → write → compensate)
//!   │    ├─ validator          (pairing invariant, preconditions)
//!   │    ├─ LockStateMachine   (lock transitions while paired)
//!   │    └─ paired_write       (user-then-spid write with undo)
//!   ├─ EntityRegistry          (registration, telemetry, remote users)
//!   └─ EntityStore             (get/put per entity, versioned)
//!        ├─ MemoryStore
//!        └─ ChaoticStore       (fault injection)
//! ```
//!
//! ## Pairing Invariant
//!
//! For every committed state: `user.current_spid == Some(spid.id)` iff
//! `spid.current_user == Some(user.id)`. The coordinator may break it between
//! its two writes and restores it before returning, except when the undo
//! write also fails, which is reported as
//! [`AssociationError::FatalInconsistency`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod convert;
pub mod coordinator;
pub mod entity;
pub mod env;
pub mod error;
pub mod ids;
pub mod lock;
pub mod paired_write;
pub mod registry;
pub mod store;
pub mod validator;

pub use convert::ConversionError;
pub use coordinator::AssociationCoordinator;
pub use entity::{EntityKind, Position, Spid, User};
pub use env::Environment;
pub use error::{AssociationError, Inconsistency, Operation, OperationError};
pub use ids::{IdError, SpidId, UserId};
pub use lock::{LockState, LockStateMachine, SameStatePolicy, Transition, TransitionError};
pub use registry::EntityRegistry;
pub use store::{ChaoticStore, EntityStore, MemoryStore, StoreError, Version, Versioned};
pub use validator::PairingStatus;
