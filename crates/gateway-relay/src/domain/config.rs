//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.  It
//! is built once at startup from the TOML file and CLI flags (see
//! `infrastructure::config_file`) and then shared read-only.
//!
//! # Design rationale
//!
//! Keeping configuration as plain, already-validated structs (typed addresses,
//! `Duration`s, an [`OffensePolicy`]) means the rest of the relay never has to
//! re-check a port number or a zero attempt count.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use gateway_core::protocol::messages::DEFAULT_MASTER_PORT;
use gateway_core::OffensePolicy;

/// Default HTTP listener port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Where the master's command port lives.
///
/// The host stays a name: it is resolved again on every connection attempt,
/// so a master that moves to a new address is found on the next reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEndpoint {
    pub host: String,
    pub port: u16,
}

impl MasterEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<SocketAddr> for MasterEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for MasterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// How the relay reaches and stays connected to the master process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Host and command port of the master.
    pub master: MasterEndpoint,

    /// Pause between failed connection attempts.
    pub reconnect_interval: Duration,

    /// Upper bound on a single connection attempt.
    pub connect_timeout: Duration,

    /// Upper bound on writing one command, so a hung socket cannot stall every
    /// request queued behind the writer lock.
    pub write_timeout: Duration,
}

impl Default for LinkSettings {
    /// | Field              | Default           |
    /// |--------------------|-------------------|
    /// | master             | `127.0.0.1:60102` |
    /// | reconnect_interval | 500 ms            |
    /// | connect_timeout    | 2 s               |
    /// | write_timeout      | 2 s               |
    fn default() -> Self {
        Self {
            master: MasterEndpoint::new(Ipv4Addr::LOCALHOST.to_string(), DEFAULT_MASTER_PORT),
            reconnect_interval: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
        }
    }
}

/// Optional files overriding the built-in HTML pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSources {
    pub index: Option<PathBuf>,
    pub ok: Option<PathBuf>,
    pub error: Option<PathBuf>,
}

/// The privileged master process to launch and supervise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// All runtime configuration for the relay.
#[derive(Clone)]
pub struct RelayConfig {
    /// Address the HTTP server binds to.
    pub http_bind_addr: SocketAddr,

    /// The shared secret clients must submit.
    pub password: String,

    /// Failure limit and lockout window.
    pub policy: OffensePolicy,

    pub link: LinkSettings,

    pub pages: PageSources,

    /// When set, the relay launches this process and exits if it ever dies.
    pub master_command: Option<MasterCommand>,
}

// Hand-written so the shared secret never reaches a log line.
impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("http_bind_addr", &self.http_bind_addr)
            .field("password", &"<redacted>")
            .field("policy", &self.policy)
            .field("link", &self.link)
            .field("pages", &self.pages)
            .field("master_command", &self.master_command)
            .finish()
    }
}

impl RelayConfig {
    /// Builds a config with the given password and every other field at its default.
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            http_bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_HTTP_PORT)),
            password: password.into(),
            policy: OffensePolicy::default(),
            link: LinkSettings::default(),
            pages: PageSources::default(),
            master_command: None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
