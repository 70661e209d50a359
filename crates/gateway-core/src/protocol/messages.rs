//! Command types sent from the relay to the privileged master process.
//!
//! The protocol is fire-and-forget: the relay writes one fixed-size command per
//! successful authorization and never reads a reply.  See
//! [`crate::protocol::codec`] for the exact byte layout.

use std::net::Ipv4Addr;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Total size of one encoded command in bytes: opcode (1) + IP (4) + expiration (4).
pub const COMMAND_SIZE: usize = 9;

/// TCP port the privileged master process listens on unless configured otherwise.
pub const DEFAULT_MASTER_PORT: u16 = 60102;

/// Wire value of the expiration field meaning "never expire".
pub const NO_EXPIRATION_SENTINEL: i32 = -1;

// ── Opcodes ───────────────────────────────────────────────────────────────────

/// Operation code byte, the first byte of every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Grant the carried IP address access for the carried duration.
    Authenticate = 0x00,
}

impl TryFrom<u8> for Opcode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Opcode::Authenticate),
            _ => Err(()),
        }
    }
}

// ── Expiration ────────────────────────────────────────────────────────────────

/// How long an authorization grant should last.
///
/// "Never expires" and "expires immediately" are distinct values here rather
/// than two meanings of the same integer:
///
/// | Variant       | Wire value (`i32`) |
/// |---------------|--------------------|
/// | `Never`       | `-1`               |
/// | `After(0)`    | `0`                |
/// | `After(3600)` | `3600`             |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiration {
    /// The grant stays in force until the master forgets it.
    Never,
    /// The grant lapses after this many seconds.
    After(u32),
}

impl Expiration {
    /// Largest duration the 32-bit signed wire field can carry.
    pub const MAX_SECS: u32 = i32::MAX as u32;

    /// Builds an `After` value, rejecting durations that do not fit the wire field.
    ///
    /// ```rust
    /// use gateway_core::Expiration;
    ///
    /// assert_eq!(Expiration::after_secs(60), Some(Expiration::After(60)));
    /// assert_eq!(Expiration::after_secs(u32::MAX), None);
    /// ```
    pub fn after_secs(secs: u32) -> Option<Self> {
        (secs <= Self::MAX_SECS).then_some(Expiration::After(secs))
    }

    /// Returns the signed 32-bit value written on the wire.
    ///
    /// `After` values larger than [`Expiration::MAX_SECS`] (only constructible
    /// by bypassing [`Expiration::after_secs`]) saturate at `i32::MAX`.
    pub fn to_wire(self) -> i32 {
        match self {
            Expiration::Never => NO_EXPIRATION_SENTINEL,
            Expiration::After(secs) => i32::try_from(secs).unwrap_or(i32::MAX),
        }
    }

    /// Interprets a wire value.  Returns `None` for negative values other
    /// than the "never" sentinel.
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            NO_EXPIRATION_SENTINEL => Some(Expiration::Never),
            v if v >= 0 => Some(Expiration::After(v as u32)),
            _ => None,
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// One instruction to the privileged master process.
///
/// Built fresh for every successful authorization and serialized exactly once
/// with [`crate::protocol::codec::encode_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationCommand {
    pub opcode: Opcode,
    pub ip: Ipv4Addr,
    pub expiration: Expiration,
}

impl AuthorizationCommand {
    /// Creates an `Authenticate` command for `ip`.
    pub fn authenticate(ip: Ipv4Addr, expiration: Expiration) -> Self {
        Self {
            opcode: Opcode::Authenticate,
            ip,
            expiration,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
