//! Conversion between domain entities and wire records.
//!
//! Absent pairing references become [`NIL_ID`] on the wire and back. Users
//! travel both ways (remote replication); spids are only ever sent.

use spidlink_proto::{NIL_ID, SpidRecord, UserRecord};
use thiserror::Error;

use crate::{
    entity::{Spid, User},
    ids::{IdError, SpidId, UserId},
};

/// A wire record that does not describe a valid entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// An identifier field failed to parse.
    #[error("invalid {field}: {source}")]
    InvalidId {
        /// Name of the offending field.
        field: &'static str,
        /// Parse failure.
        source: IdError,
    },
}

/// Parse a required entity identifier.
pub fn parse_user_id(field: &'static str, raw: &str) -> Result<UserId, ConversionError> {
    UserId::parse(raw).map_err(|source| ConversionError::InvalidId { field, source })
}

/// Parse a required spid identifier.
pub fn parse_spid_id(field: &'static str, raw: &str) -> Result<SpidId, ConversionError> {
    SpidId::parse(raw).map_err(|source| ConversionError::InvalidId { field, source })
}

fn parse_spid_ref(field: &'static str, raw: &str) -> Result<Option<SpidId>, ConversionError> {
    if raw == NIL_ID { Ok(None) } else { parse_spid_id(field, raw).map(Some) }
}

fn encode_ref<T: ToString>(reference: Option<T>) -> String {
    reference.map_or_else(|| NIL_ID.to_string(), |id| id.to_string())
}

impl User {
    /// Wire view of this user.
    pub fn to_record(&self) -> UserRecord {
        UserRecord {
            id: self.id.to_string(),
            name: self.name.clone(),
            position: self.position,
            current_spid_id: encode_ref(self.current_spid),
        }
    }
}

impl TryFrom<&UserRecord> for User {
    type Error = ConversionError;

    fn try_from(record: &UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_user_id("user id", &record.id)?,
            name: record.name.clone(),
            position: record.position,
            current_spid: parse_spid_ref("current spid id", &record.current_spid_id)?,
        })
    }
}

impl Spid {
    /// Wire view of this spid.
    pub fn to_record(&self) -> SpidRecord {
        SpidRecord {
            id: self.id.to_string(),
            battery_level: self.battery_level,
            location: self.location,
            current_user_id: encode_ref(self.current_user),
            lock_state: self.lock_state.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use spidlink_proto::{Position, WireLockState};

    use crate::lock::LockState;

    use super::*;

    const USER: &str = "6f1c8a4e-2b1d-4c55-9a0e-0d1f2e3c4b5a";
    const SPID: &str = "0a9b8c7d-6e5f-4a3b-8c2d-1e0f9a8b7c6d";

    #[test]
    fn unpaired_user_uses_nil_reference() {
        let user = User::new(UserId::parse(USER).unwrap(), "ada", Position::default());
        let record = user.to_record();

        assert_eq!(record.current_spid_id, NIL_ID);
        assert_eq!(User::try_from(&record).unwrap(), user);
    }

    #[test]
    fn paired_spid_keeps_reference() {
        let mut spid = Spid::new(SpidId::parse(SPID).unwrap(), 64, Position::default());
        spid.current_user = Some(UserId::parse(USER).unwrap());
        spid.lock_state = LockState::Unlocked;

        let record = spid.to_record();
        assert_eq!(record.current_user_id, USER);
        assert_eq!(record.lock_state, WireLockState::UNLOCKED);
        assert_eq!(record.battery_level, 64);
    }

    #[test]
    fn malformed_reference_names_the_field() {
        let record = UserRecord {
            id: USER.to_string(),
            name: "ada".to_string(),
            position: Position::default(),
            current_spid_id: "garbage".to_string(),
        };

        let err = User::try_from(&record).unwrap_err();
        assert_eq!(err.to_string(), "invalid current spid id: malformed identifier `garbage`");
    }

    #[test]
    fn nil_entity_id_is_rejected() {
        let record = UserRecord {
            id: NIL_ID.to_string(),
            name: "ada".to_string(),
            position: Position::default(),
            current_spid_id: NIL_ID.to_string(),
        };

        assert!(matches!(
            User::try_from(&record),
            Err(ConversionError::InvalidId { source: IdError::Nil, .. })
        ));
    }
}
