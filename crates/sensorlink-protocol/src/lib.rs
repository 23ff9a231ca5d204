//! # sensorlink-protocol
//!
//! Application messages exchanged with the bioreactor controller.
//!
//! The channel itself is payload-agnostic: it forwards inbound text as-is and
//! transmits whatever serializable value it is given. This crate gives hosts
//! typed messages for both directions and a JSON text codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_command, decode_snapshot, encode_message, CodecError};
pub use messages::*;
