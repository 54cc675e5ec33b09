//! Push message data model and decoding.
//!
//! - [`Request`]: one decoded push (flat record covering every kind)
//! - [`MessageKind`] / [`EventKind`]: the two routing discriminators
//! - [`decode_into`]: XML body decoder writing into a reusable `Request`

pub mod decode;
pub mod request;

pub use decode::{decode_into, DecodeError};
pub use request::{EventKind, MessageKind, Request};
