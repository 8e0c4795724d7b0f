//! Users and Spids.

use std::fmt;

pub use spidlink_proto::Position;

use crate::{
    ids::{SpidId, UserId},
    lock::LockState,
};

/// Highest accepted battery level (percent).
pub const MAX_BATTERY_LEVEL: u8 = 100;

/// The two entity kinds held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A [`User`].
    User,
    /// A [`Spid`].
    Spid,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Spid => f.write_str("spid"),
        }
    }
}

/// A person who can claim one spid at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Immutable identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Last known position.
    pub position: Position,
    /// Spid this user is paired with.
    pub current_spid: Option<SpidId>,
}

impl User {
    /// Create an unpaired user.
    pub fn new(id: UserId, name: impl Into<String>, position: Position) -> Self {
        Self { id, name: name.into(), position, current_spid: None }
    }

    /// Check if the user holds a pairing.
    pub fn is_paired(&self) -> bool {
        self.current_spid.is_some()
    }
}

/// A shared physical device.
#[derive(Debug, Clone, PartialEq)]
pub struct Spid {
    /// Immutable identifier.
    pub id: SpidId,
    /// Battery level in percent (0..=100).
    pub battery_level: u8,
    /// Last known location.
    pub location: Position,
    /// User this spid is paired with.
    pub current_user: Option<UserId>,
    /// Physical lock state.
    pub lock_state: LockState,
}

impl Spid {
    /// Create an unpaired, locked spid.
    pub fn new(id: SpidId, battery_level: u8, location: Position) -> Self {
        Self { id, battery_level, location, current_user: None, lock_state: LockState::Locked }
    }

    /// Check if the spid holds a pairing.
    pub fn is_paired(&self) -> bool {
        self.current_user.is_some()
    }
}
