//! Spidlink wire protocol.
//!
//! Message types exchanged between request clients and the Spidlink server,
//! plus the length-prefixed CBOR frame codec that carries them.
//!
//! ## Frame Layout
//!
//! ```text
//! +----------------+------------------------------+
//! | length (u32be) | CBOR-encoded Request/Response |
//! +----------------+------------------------------+
//! ```
//!
//! Entity identifiers travel as UUID strings. An absent pairing reference is
//! encoded as [`NIL_ID`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
pub mod payloads;

pub use error::ProtoError;
pub use frame::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE, FrameCodec};
pub use payloads::{
    entity::{NIL_ID, Position, SpidRecord, UserRecord, WireLockState},
    request::Request,
    response::{ErrorKind, Response, ResponseBody},
};
