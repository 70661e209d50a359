//! TOML configuration file for the relay.
//!
//! The file is read once at startup into a [`FileConfig`], CLI overrides are
//! applied on top (see `main.rs`), and [`FileConfig::into_relay_config`]
//! validates the result into a typed [`RelayConfig`].
//!
//! # Example file
//!
//! ```toml
//! password = "hunter2"
//! attempts = 3
//! timeout = 60
//!
//! [http]
//! bind = "0.0.0.0:8080"
//!
//! [master]
//! host = "127.0.0.1"
//! port = 60102
//! reconnect_interval_ms = 500
//! command = "/usr/local/bin/gateway-master"
//! args = ["/var/gateway-config"]
//!
//! [pages]
//! error = "/var/gateway-page-err.html"
//! ```
//!
//! Every key except `password` is optional.  Fields annotated with
//! `#[serde(default = "some_fn")]` take the value of `some_fn()` when absent,
//! so an empty file (or no file at all) plus a `--password` flag is a complete
//! configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use gateway_core::protocol::messages::DEFAULT_MASTER_PORT;
use gateway_core::OffensePolicy;

use crate::domain::{LinkSettings, MasterCommand, MasterEndpoint, PageSources, RelayConfig};

/// Where the relay looks for its config file when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gateway/relay.toml";

/// Error type for loading and validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error other than "not found".
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The content parsed but describes an unusable configuration.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// The config file as written on disk.
///
/// Deliberately has no `Debug` impl: it holds the password in clear.
#[derive(Clone, Deserialize, PartialEq)]
pub struct FileConfig {
    /// Shared secret.  Required, either here or on the command line.
    #[serde(default)]
    pub password: Option<String>,
    /// Failed attempts allowed inside one window.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Window length and lockout duration, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub http: HttpSection,
    #[serde(default)]
    pub master: MasterSection,
    #[serde(default)]
    pub pages: PagesSection,
}

/// `[http]`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HttpSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// `[master]`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MasterSection {
    /// Hostname or IP literal; looked up again on every reconnect.
    #[serde(default = "default_master_host")]
    pub host: String,
    #[serde(default = "default_master_port")]
    pub port: u16,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Supervised master executable.  Absent means the master is managed
    /// elsewhere (systemd, another container).
    #[serde(default)]
    pub command: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// `[pages]`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PagesSection {
    #[serde(default)]
    pub index: Option<PathBuf>,
    #[serde(default)]
    pub ok: Option<PathBuf>,
    #[serde(default)]
    pub error: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_attempts() -> u32 {
    3
}
fn default_timeout() -> u64 {
    60
}
fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_master_host() -> String {
    "127.0.0.1".to_string()
}
fn default_master_port() -> u16 {
    DEFAULT_MASTER_PORT
}
fn default_reconnect_interval_ms() -> u64 {
    500
}
fn default_connect_timeout_ms() -> u64 {
    2000
}
fn default_write_timeout_ms() -> u64 {
    2000
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            password: None,
            attempts: default_attempts(),
            timeout: default_timeout(),
            http: HttpSection::default(),
            master: MasterSection::default(),
            pages: PagesSection::default(),
        }
    }
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for MasterSection {
    fn default() -> Self {
        Self {
            host: default_master_host(),
            port: default_master_port(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            command: None,
            args: Vec::new(),
        }
    }
}

// ── Loading and validation ────────────────────────────────────────────────────

/// Loads the config file at `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

impl FileConfig {
    /// Validates the file contents into a [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the password is missing or empty,
    /// `attempts` is zero, the bind address cannot be parsed, the master host
    /// is empty, or a link interval is zero.  The master host is not resolved
    /// here; the link looks it up on every connection attempt.
    pub fn into_relay_config(self) -> Result<RelayConfig, ConfigError> {
        let password = match self.password {
            Some(p) if !p.is_empty() => p,
            _ => {
                return Err(ConfigError::Invalid(
                    "a non-empty password must be set in the config file or with --password"
                        .to_string(),
                ))
            }
        };

        let policy = OffensePolicy::new(self.attempts, Duration::from_secs(self.timeout))
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let http_bind_addr: SocketAddr = self.http.bind.parse().map_err(|_| {
            ConfigError::Invalid(format!("invalid [http] bind address: '{}'", self.http.bind))
        })?;

        let host = self.master.host.trim();
        if host.is_empty() {
            return Err(ConfigError::Invalid("[master] host must not be empty".to_string()));
        }
        let link = LinkSettings {
            master: MasterEndpoint::new(host, self.master.port),
            reconnect_interval: positive_millis(
                "reconnect_interval_ms",
                self.master.reconnect_interval_ms,
            )?,
            connect_timeout: positive_millis("connect_timeout_ms", self.master.connect_timeout_ms)?,
            write_timeout: positive_millis("write_timeout_ms", self.master.write_timeout_ms)?,
        };

        let master_command = self.master.command.map(|program| MasterCommand {
            program,
            args: self.master.args,
        });

        Ok(RelayConfig {
            http_bind_addr,
            password,
            policy,
            link,
            pages: PageSources {
                index: self.pages.index,
                ok: self.pages.ok,
                error: self.pages.error,
            },
            master_command,
        })
    }
}

fn positive_millis(key: &str, ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::Invalid(format!("[master] {key} must be greater than zero")));
    }
    Ok(Duration::from_millis(ms))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> FileConfig {
        toml::from_str(text).expect("valid TOML")
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        // Arrange / Act
        let cfg = parse("");

        // Assert
        assert!(cfg.password.is_none());
        assert_eq!(cfg.attempts, 3);
        assert_eq!(cfg.timeout, 60);
        assert_eq!(cfg.http.bind, "0.0.0.0:8080");
        assert_eq!(cfg.master.port, 60102);
        assert_eq!(cfg.master.reconnect_interval_ms, 500);
        assert!(cfg.master.command.is_none());
    }

    #[test]
    fn test_full_file_parses_every_section() {
        let cfg = parse(
            r#"
            password = "hunter2"
            attempts = 5
            timeout = 120

            [http]
            bind = "127.0.0.1:9000"

            [master]
            host = "127.0.0.1"
            port = 7000
            reconnect_interval_ms = 250
            command = "/usr/local/bin/gateway-master"
            args = ["/var/gateway-config"]

            [pages]
            error = "/var/gateway-page-err.html"
            "#,
        );

        let relay = cfg.into_relay_config().unwrap();

        assert_eq!(relay.password, "hunter2");
        assert_eq!(relay.policy.max_attempts(), 5);
        assert_eq!(relay.policy.timeout(), Duration::from_secs(120));
        assert_eq!(relay.http_bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(relay.link.master, MasterEndpoint::new("127.0.0.1", 7000));
        assert_eq!(relay.link.reconnect_interval, Duration::from_millis(250));
        assert_eq!(relay.link.write_timeout, Duration::from_secs(2));
        let command = relay.master_command.unwrap();
        assert_eq!(command.program, PathBuf::from("/usr/local/bin/gateway-master"));
        assert_eq!(command.args, vec!["/var/gateway-config".to_string()]);
        assert_eq!(
            relay.pages.error,
            Some(PathBuf::from("/var/gateway-page-err.html"))
        );
        assert!(relay.pages.index.is_none());
    }

    #[test]
    fn test_missing_password_is_invalid() {
        let err = parse("attempts = 3").into_relay_config().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_empty_password_is_invalid() {
        let err = parse(r#"password = """#).into_relay_config().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_attempts_is_invalid() {
        let err = parse("password = \"x\"\nattempts = 0")
            .into_relay_config()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_bind_address_is_invalid() {
        let err = parse("password = \"x\"\n[http]\nbind = \"not an address\"")
            .into_relay_config()
            .unwrap_err();
        assert!(err.to_string().contains("not an address"));
    }

    #[test]
    fn test_master_hostname_is_kept_for_lookup_at_connect_time() {
        // Arrange: a name no resolver knows; loading must not depend on DNS.
        let cfg = parse("password = \"x\"\n[master]\nhost = \"master.gateway.invalid\"\nport = 7000");

        // Act
        let relay = cfg.into_relay_config().unwrap();

        // Assert
        assert_eq!(relay.link.master.host, "master.gateway.invalid");
        assert_eq!(relay.link.master.port, 7000);
    }

    #[test]
    fn test_blank_master_host_is_invalid() {
        let err = parse("password = \"x\"\n[master]\nhost = \"  \"")
            .into_relay_config()
            .unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_zero_reconnect_interval_is_invalid() {
        let err = parse("password = \"x\"\n[master]\nreconnect_interval_ms = 0")
            .into_relay_config()
            .unwrap_err();
        assert!(err.to_string().contains("reconnect_interval_ms"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result: Result<FileConfig, _> = toml::from_str("password = ");
        let err = ConfigError::from(result.err().unwrap());
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_missing_file_returns_defaults() {
        let cfg = load_config(Path::new("/nonexistent/gateway/relay.toml")).unwrap();
        assert_eq!(cfg.attempts, 3);
        assert!(cfg.password.is_none());
    }

    #[test]
    fn test_load_config_reads_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!("gateway-relay-{}.toml", std::process::id()));
        std::fs::write(&path, "password = \"from-file\"\ntimeout = 5\n").unwrap();

        // Act
        let cfg = load_config(&path).unwrap();

        // Assert
        assert_eq!(cfg.password.as_deref(), Some("from-file"));
        assert_eq!(cfg.timeout, 5);
        std::fs::remove_file(&path).unwrap();
    }
}
