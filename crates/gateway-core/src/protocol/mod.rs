//! Protocol module containing the command types and the binary codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_command, encode_command, ProtocolError};
pub use messages::*;
