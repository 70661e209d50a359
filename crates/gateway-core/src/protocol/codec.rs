//! Binary codec for authorization commands.
//!
//! Wire format:
//! ```text
//! offset  0        1                5                9
//!         [opcode:1][ip_address:4   ][expiration:4   ]
//! ```
//! Total size: 9 bytes, no header, no padding.  All multi-byte integers are
//! big-endian (network byte order): the IP address is laid out exactly as
//! `inet_aton` would produce it, and the expiration is a signed 32-bit value
//! where `-1` (`FF FF FF FF`) means "never expire".
//!
//! Encoding is infallible.  Decoding is not needed by the relay itself (the
//! protocol has no reply path) but is provided for stub masters and tests.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::protocol::messages::{AuthorizationCommand, Expiration, Opcode, COMMAND_SIZE};

/// Errors that can occur while decoding a command.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than one command.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The opcode byte is not a recognized value.
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// The expiration field is negative but not the "never" sentinel.
    #[error("invalid expiration value: {0}")]
    InvalidExpiration(i32),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a command into its fixed 9-byte wire form.
///
/// # Examples
///
/// ```rust
/// use std::net::Ipv4Addr;
/// use gateway_core::{encode_command, AuthorizationCommand, Expiration};
///
/// let cmd = AuthorizationCommand::authenticate(Ipv4Addr::new(127, 0, 0, 1), Expiration::After(3600));
/// let bytes = encode_command(&cmd);
/// assert_eq!(bytes, [0x00, 0x7F, 0x00, 0x00, 0x01, 0x00, 0x00, 0x0E, 0x10]);
/// ```
pub fn encode_command(cmd: &AuthorizationCommand) -> [u8; COMMAND_SIZE] {
    let mut buf = [0u8; COMMAND_SIZE];
    buf[0] = cmd.opcode as u8;
    // `octets()` is already in network order.
    buf[1..5].copy_from_slice(&cmd.ip.octets());
    buf[5..9].copy_from_slice(&cmd.expiration.to_wire().to_be_bytes());
    buf
}

/// Decodes one command from the beginning of `bytes`.
///
/// Returns the command and the number of bytes consumed (always
/// [`COMMAND_SIZE`]) so a reader can advance through a stream buffer.
///
/// # Errors
///
/// Returns [`ProtocolError`] if fewer than 9 bytes are available, the opcode is
/// unknown, or the expiration is an unsupported negative value.
pub fn decode_command(bytes: &[u8]) -> Result<(AuthorizationCommand, usize), ProtocolError> {
    if bytes.len() < COMMAND_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: COMMAND_SIZE,
            available: bytes.len(),
        });
    }

    let opcode = Opcode::try_from(bytes[0]).map_err(|_| ProtocolError::UnknownOpcode(bytes[0]))?;
    let ip = Ipv4Addr::new(bytes[1], bytes[2], bytes[3], bytes[4]);
    let raw_expiration = i32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
    let expiration = Expiration::from_wire(raw_expiration)
        .ok_or(ProtocolError::InvalidExpiration(raw_expiration))?;

    Ok((
        AuthorizationCommand {
            opcode,
            ip,
            expiration,
        },
        COMMAND_SIZE,
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
