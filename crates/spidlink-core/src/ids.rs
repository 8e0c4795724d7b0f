//! Entity identifiers.
//!
//! Both kinds wrap a UUID. The nil UUID is reserved for "no reference" on the
//! wire and can never name a real entity, so constructors reject it.

use std::{fmt, str::FromStr};

use thiserror::Error;
use uuid::Uuid;

/// Errors from parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Not a UUID.
    #[error("malformed identifier `{0}`")]
    Malformed(String),

    /// The nil UUID, which only encodes an absent reference.
    #[error("nil identifier cannot name an entity")]
    Nil,
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap a UUID. Returns `None` for the nil UUID.
            pub fn new(uuid: Uuid) -> Option<Self> {
                if uuid.is_nil() { None } else { Some(Self(uuid)) }
            }

            /// Underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parse from the hyphenated (or any uuid-accepted) string form.
            pub fn parse(s: &str) -> Result<Self, IdError> {
                let uuid = Uuid::parse_str(s).map_err(|_| IdError::Malformed(s.to_string()))?;
                Self::new(uuid).ok_or(IdError::Nil)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`crate::User`].
    UserId
);

entity_id!(
    /// Identifier of a [`crate::Spid`].
    SpidId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_uuid_is_rejected() {
        assert_eq!(UserId::new(Uuid::nil()), None);
        assert_eq!(SpidId::parse(spidlink_proto::NIL_ID), Err(IdError::Nil));
    }

    #[test]
    fn malformed_string_is_rejected() {
        let err = UserId::parse("not-a-uuid").unwrap_err();
        assert_eq!(err, IdError::Malformed("not-a-uuid".to_string()));
        assert_eq!(err.to_string(), "malformed identifier `not-a-uuid`");
    }

    #[test]
    fn display_is_hyphenated_lowercase() {
        let id: SpidId = "0A9B8C7D-6E5F-4A3B-8C2D-1E0F9A8B7C6D".parse().unwrap();
        assert_eq!(id.to_string(), "0a9b8c7d-6e5f-4a3b-8c2d-1e0f9a8b7c6d");
    }
}
