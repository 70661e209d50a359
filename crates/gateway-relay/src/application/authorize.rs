//! The authorization use case.
//!
//! One call to [`AuthorizationService::authorize`] handles one submitted form:
//!
//! ```text
//! form fields ──► parse expiration ──► offense gate ──► GatewayLink ──► grant
//!      │                │                   │               │
//!      ▼                ▼                   ▼               ▼
//! MissingField   InvalidExpiration      LockedOut     WrongPassword (recorded)
//!                                                    BackendUnavailable
//! ```
//!
//! The offense tracker is checked *before* the link is contacted and updated
//! only after a wrong password.  A grant leaves any earlier failures in place;
//! the timeout window alone decides when they are forgotten.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use gateway_core::{Expiration, OffenseTracker};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::gateway_link::{GatewayLink, LinkError};

/// Broad category of an [`AuthorizeError`], used to choose a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself was malformed; nothing was changed.
    ClientInput,
    /// The request was well-formed but refused by policy.
    PolicyRejection,
    /// The password was right but the master could not be told.
    Transport,
}

/// Why an authorization request did not result in a grant.
#[derive(Debug, Error)]
pub enum AuthorizeError {
    /// A required form field was absent.
    #[error("'{0}' is not present")]
    MissingField(&'static str),

    /// The expiration field is not an acceptable integer.
    #[error("invalid expiration: {0:?}")]
    InvalidExpiration(String),

    /// The client address cannot be carried by the 32-bit command field.
    #[error("address {0} cannot be authorized: only IPv4 clients are supported")]
    UnsupportedAddress(IpAddr),

    /// The password did not match.  The failure has been recorded.
    #[error("wrong password; {remaining} of {total} attempt(s) remaining")]
    WrongPassword { remaining: u32, total: u32 },

    /// The address is locked out; the link was not contacted.
    #[error("locked out for {timeout_secs}s from the last attempt")]
    LockedOut {
        remaining: u32,
        total: u32,
        timeout_secs: u64,
    },

    /// The master could not be reached.  No failure was recorded.
    #[error("authorization backend unavailable: {0}")]
    BackendUnavailable(#[from] LinkError),
}

impl AuthorizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthorizeError::MissingField(_)
            | AuthorizeError::InvalidExpiration(_)
            | AuthorizeError::UnsupportedAddress(_) => ErrorKind::ClientInput,
            AuthorizeError::WrongPassword { .. } | AuthorizeError::LockedOut { .. } => {
                ErrorKind::PolicyRejection
            }
            AuthorizeError::BackendUnavailable(_) => ErrorKind::Transport,
        }
    }
}

/// A successful grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Granted {
    pub ip: Ipv4Addr,
    pub expiration: Expiration,
}

/// Parses the raw `expiration` form field.
///
/// | Input                   | Result                  |
/// |-------------------------|-------------------------|
/// | `""`, `"0"`, `"-1"`     | `Expiration::Never`     |
/// | `"1"` ..= `"2147483647"` | `Expiration::After(n)`  |
/// | anything else           | `InvalidExpiration`     |
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`AuthorizeError::InvalidExpiration`] for non-integers, negative
/// values other than `-1`, and values that do not fit a signed 32-bit field.
pub fn parse_expiration(raw: &str) -> Result<Expiration, AuthorizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Expiration::Never);
    }

    let invalid = || AuthorizeError::InvalidExpiration(raw.to_string());
    let value: i64 = trimmed.parse().map_err(|_| invalid())?;

    match value {
        0 | -1 => Ok(Expiration::Never),
        v if v > 0 => u32::try_from(v)
            .ok()
            .and_then(Expiration::after_secs)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// Orchestrates one authorization attempt across the offense tracker and the link.
pub struct AuthorizationService {
    link: Arc<dyn GatewayLink>,
    tracker: Arc<OffenseTracker>,
}

impl AuthorizationService {
    pub fn new(link: Arc<dyn GatewayLink>, tracker: Arc<OffenseTracker>) -> Self {
        Self { link, tracker }
    }

    pub fn tracker(&self) -> &Arc<OffenseTracker> {
        &self.tracker
    }

    /// Handles one submitted form from `remote`.
    ///
    /// The offense gate and the failure record are separate lock
    /// acquisitions around the link call.  Concurrent wrong guesses from one
    /// address can therefore all pass the gate at `max_attempts - 1`; at most
    /// one extra guess per worker thread gets through, because
    /// [`MasterLink`](crate::infrastructure::MasterLink) rejects a wrong
    /// password without suspending.  The stored count still saturates at
    /// `max_attempts`, so the lockout itself is never extended or skipped.
    ///
    /// # Errors
    ///
    /// See [`AuthorizeError`]; only [`AuthorizeError::WrongPassword`] mutates
    /// the offense tracker.
    pub async fn authorize(
        &self,
        remote: IpAddr,
        password: Option<&str>,
        expiration: Option<&str>,
    ) -> Result<Granted, AuthorizeError> {
        // 1. Client input.
        let password = password.ok_or(AuthorizeError::MissingField("password"))?;
        let expiration = expiration.ok_or(AuthorizeError::MissingField("expiration"))?;
        let expiration = parse_expiration(expiration)?;
        let ip = ipv4_of(remote)?;
        let key = IpAddr::V4(ip);

        let policy = self.tracker.policy();
        let total = policy.max_attempts();

        // 2. Offense gate.
        let status = self.tracker.purge_if_freed(key);
        if status.is_blocked() {
            debug!(%ip, "rejecting request from locked-out address");
            return Err(AuthorizeError::LockedOut {
                remaining: self.tracker.remaining_attempts(key),
                total,
                timeout_secs: policy.timeout().as_secs(),
            });
        }

        // 3. Link.
        match self.link.authenticate(ip, password, expiration).await {
            Ok(true) => {
                info!(%ip, ?expiration, "access granted");
                Ok(Granted { ip, expiration })
            }
            Ok(false) => {
                let record = self.tracker.record_failure(key);
                let remaining = total.saturating_sub(record.failed_attempts);
                info!(%ip, remaining, "wrong password");
                Err(AuthorizeError::WrongPassword { remaining, total })
            }
            Err(e) => {
                warn!(%ip, error = %e, "password accepted but master unreachable");
                Err(AuthorizeError::BackendUnavailable(e))
            }
        }
    }
}

/// Unmaps IPv4-mapped IPv6 peers; rejects genuine IPv6 peers.
fn ipv4_of(remote: IpAddr) -> Result<Ipv4Addr, AuthorizeError> {
    match remote {
        IpAddr::V4(v4) => Ok(v4),
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .ok_or(AuthorizeError::UnsupportedAddress(remote)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
