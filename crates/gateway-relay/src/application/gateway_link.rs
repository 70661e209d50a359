//! The seam between the authorization use case and the master process.
//!
//! The use case only needs one thing from the outside world: "check this
//! password and, if it is right, tell the master to let this address in".
//! Production code implements that over TCP
//! (`infrastructure::master_link::MasterLink`); tests substitute a mock.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use gateway_core::Expiration;
use thiserror::Error;

/// Transport-level failures talking to the master.
///
/// A wrong password is *not* an error: it is `Ok(false)`.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No connection is currently established; a reconnect is in progress.
    #[error("not connected to the master process")]
    NotConnected,

    /// Writing the command failed, including after one reconnect-and-retry.
    #[error("write to master failed: {0}")]
    Transport(#[source] std::io::Error),

    /// Writing the command did not finish within the configured bound.
    #[error("write to master timed out after {0:?}")]
    Timeout(Duration),
}

/// Observable connection state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    /// Initial connection not yet established.
    Connecting,
    /// A live connection is installed.
    Connected,
    /// The connection was lost and is being re-established.
    Reconnecting,
}

impl LinkHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkHealth::Connecting => "connecting",
            LinkHealth::Connected => "connected",
            LinkHealth::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for LinkHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks a password and, on a match, instructs the master to grant `ip` access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayLink: Send + Sync {
    /// Returns `Ok(true)` once the grant command has been written,
    /// `Ok(false)` when the password is wrong (nothing is sent), and
    /// [`LinkError`] when the password matched but the master is unreachable.
    async fn authenticate(
        &self,
        ip: Ipv4Addr,
        password: &str,
        expiration: Expiration,
    ) -> Result<bool, LinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_health_display_is_lowercase() {
        assert_eq!(LinkHealth::Connecting.to_string(), "connecting");
        assert_eq!(LinkHealth::Connected.to_string(), "connected");
        assert_eq!(LinkHealth::Reconnecting.to_string(), "reconnecting");
    }

    #[test]
    fn test_link_error_messages_are_descriptive() {
        let err = LinkError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "write to master timed out after 2s");
        assert_eq!(
            LinkError::NotConnected.to_string(),
            "not connected to the master process"
        );
    }
}
