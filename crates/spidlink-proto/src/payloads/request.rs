//! Client requests.

use serde::{Deserialize, Serialize};

use super::entity::{Position, UserRecord, WireLockState};

/// A request handled by the Spidlink server.
///
/// Direct record management (`GetUser` .. `DeleteSpid`), the association
/// protocol (`RequestAssociation` .. `RequestLockChange`), and the remote user
/// replication forwarders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Fetch a user.
    GetUser {
        /// User to fetch.
        user_id: String,
    },

    /// Register a new user.
    RegisterUser {
        /// Display name.
        name: String,
        /// Initial position.
        position: Position,
    },

    /// Update a user's position.
    UpdateUser {
        /// User to update.
        user_id: String,
        /// New position.
        position: Position,
    },

    /// Delete a user.
    DeleteUser {
        /// User to delete.
        user_id: String,
    },

    /// Fetch a spid.
    GetSpid {
        /// Spid to fetch.
        spid_id: String,
    },

    /// Register a new spid.
    RegisterSpid {
        /// Initial battery level in percent.
        battery_level: u8,
        /// Initial location.
        location: Position,
    },

    /// Update a spid's battery level and location.
    UpdateSpid {
        /// Spid to update.
        spid_id: String,
        /// New battery level in percent.
        battery_level: u8,
        /// New location.
        location: Position,
    },

    /// Delete a spid.
    DeleteSpid {
        /// Spid to delete.
        spid_id: String,
    },

    /// Pair a user with a spid.
    RequestAssociation {
        /// Requesting user.
        user_id: String,
        /// Spid to claim.
        spid_id: String,
    },

    /// Release the user's current spid.
    RequestDissociation {
        /// Requesting user.
        user_id: String,
    },

    /// Read the spid paired with the user.
    RequestSpidInfo {
        /// Requesting user.
        user_id: String,
        /// Paired spid.
        spid_id: String,
    },

    /// Change the lock state of the user's paired spid.
    RequestLockChange {
        /// Requesting user.
        user_id: String,
        /// Paired spid.
        spid_id: String,
        /// Requested lock state.
        lock_state: WireLockState,
    },

    /// Store a user replicated from another server.
    AddRemoteUser {
        /// Replicated record.
        user: UserRecord,
    },

    /// Overwrite a replicated user.
    UpdateRemoteUser {
        /// Replicated record.
        user: UserRecord,
    },

    /// Remove a replicated user.
    RemoveRemoteUser {
        /// User to remove.
        user_id: String,
    },
}
