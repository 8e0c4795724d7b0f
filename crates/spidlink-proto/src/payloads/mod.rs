//! Message payload types.
//!
//! - [`entity`]: wire views of users and spids
//! - [`request`]: client requests
//! - [`response`]: server responses

pub mod entity;
pub mod request;
pub mod response;
