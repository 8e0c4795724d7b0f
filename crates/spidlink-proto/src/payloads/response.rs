//! Server responses.

use serde::{Deserialize, Serialize};

use super::entity::{SpidRecord, UserRecord};

/// Stable error classification sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request was malformed (bad identifier, invalid field value).
    InvalidRequest,
    /// Referenced user or spid does not exist.
    NotFound,
    /// An entity with this identifier already exists.
    AlreadyExists,
    /// Entity already holds a pairing.
    AlreadyPaired,
    /// No pairing exists between the entities.
    NotPaired,
    /// Lock state change rejected.
    InvalidTransition,
    /// A store read failed; the request can be retried.
    ReadFailed,
    /// A store write failed; the request can be retried.
    WriteFailed,
    /// Stored pairing data is inconsistent and needs operator attention.
    FatalInconsistency,
}

/// Entity carried by a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum ResponseBody {
    /// No entity (e.g. remote user forwarders).
    Empty,
    /// A user view.
    User(UserRecord),
    /// A spid view.
    Spid(SpidRecord),
}

/// Reply to a [`crate::Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Request succeeded.
    Ok {
        /// Human-readable summary.
        message: String,
        /// Resulting entity view.
        body: ResponseBody,
    },

    /// Request failed.
    Error {
        /// Operation that failed (e.g. "request association").
        operation: String,
        /// Error classification.
        kind: ErrorKind,
        /// Full error message, prefixed with the operation.
        message: String,
    },
}

impl Response {
    /// Check if the response reports success.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Error kind, if this is an error response.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { kind, .. } => Some(*kind),
        }
    }
}
