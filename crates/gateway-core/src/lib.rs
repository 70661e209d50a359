//! # gateway-core
//!
//! Shared library for the access gateway containing the authorization command
//! codec and the per-IP offense tracker.
//!
//! This crate is used by the HTTP relay (and by test harnesses that stand in
//! for the privileged master process).  It has zero dependencies on network
//! sockets, HTTP frameworks, or async runtimes.
//!
//! # Architecture overview (for beginners)
//!
//! The gateway lets a client open a time-boxed hole in a firewall by posting a
//! shared password to a small web relay.  The relay never touches the firewall
//! itself: it forwards a tiny binary instruction to a separate privileged
//! process (the "master") which does the actual work.
//!
//! This crate (`gateway-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How the instruction travels over the wire.  Each command
//!   is a fixed 9-byte record: `[opcode:1][ip:4][expiration:4]`.
//!
//! - **`domain`** – Pure business logic with no I/O.  The most important piece
//!   is the `OffenseTracker`: a lock-guarded map from client IP to its recent
//!   failed attempts, which decides whether an IP is currently locked out.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `gateway_core::OffenseTracker` instead of the full module path.
pub use domain::clock::{Clock, ManualClock, SystemClock};
pub use domain::offense::{OffensePolicy, OffenseRecord, OffenseStatus, OffenseTracker, PolicyError};
pub use protocol::codec::{decode_command, encode_command, ProtocolError};
pub use protocol::messages::{
    AuthorizationCommand, Expiration, Opcode, COMMAND_SIZE, DEFAULT_MASTER_PORT,
};
