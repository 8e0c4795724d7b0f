//! Wire views of users and spids.
//!
//! These are transport shapes only. Identifiers are unparsed strings and the
//! lock state is a raw code, so validation happens once at the domain
//! boundary instead of inside the decoder.

use serde::{Deserialize, Serialize};

/// Encoding of an absent pairing reference.
pub const NIL_ID: &str = "00000000-0000-0000-0000-000000000000";

/// GPS position in decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Raw lock-state code as carried on the wire.
///
/// Unknown codes survive decoding and are rejected by the lock state
/// machine, so a newer client gets a typed error instead of a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireLockState(pub u8);

impl WireLockState {
    /// Lock engaged.
    pub const LOCKED: Self = Self(0);
    /// Lock released.
    pub const UNLOCKED: Self = Self(1);
}

/// User as exchanged on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User identifier (UUID string).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Last known position.
    pub position: Position,
    /// Paired spid, or [`NIL_ID`].
    pub current_spid_id: String,
}

/// Spid as exchanged on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpidRecord {
    /// Spid identifier (UUID string).
    pub id: String,
    /// Battery level in percent.
    pub battery_level: u8,
    /// Last known location.
    pub location: Position,
    /// Paired user, or [`NIL_ID`].
    pub current_user_id: String,
    /// Lock state code.
    pub lock_state: WireLockState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_state_is_encoded_as_bare_integer() {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&WireLockState::UNLOCKED, &mut bytes).expect("encode");

        // CBOR unsigned integer 1 is the single byte 0x01
        assert_eq!(bytes, vec![0x01]);
    }

    #[test]
    fn spid_record_keeps_unknown_lock_code() {
        let record = SpidRecord {
            id: "0a9b8c7d-6e5f-4a3b-8c2d-1e0f9a8b7c6d".to_string(),
            battery_level: 77,
            location: Position { latitude: 45.5, longitude: -73.6 },
            current_user_id: NIL_ID.to_string(),
            lock_state: WireLockState(9),
        };

        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&record, &mut bytes).expect("encode");
        let decoded: SpidRecord = ciborium::de::from_reader(&bytes[..]).expect("decode");

        assert_eq!(decoded.lock_state, WireLockState(9));
        assert_eq!(decoded, record);
    }
}
