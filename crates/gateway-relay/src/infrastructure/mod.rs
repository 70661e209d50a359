//! Infrastructure layer for gateway-relay.
//!
//! Everything that touches the outside world lives here:
//!
//! - [`master_link`] – the persistent TCP link to the master; implements
//!   [`GatewayLink`](crate::application::GatewayLink)
//! - [`http_server`] – axum router and server loop
//! - [`pages`] – landing, success and error HTML
//! - [`config_file`] – TOML config loading and validation
//! - [`sweeper`] – periodic cleanup of expired offense records
//! - [`supervisor`] – launches the master and aborts if it dies

pub mod config_file;
pub mod http_server;
pub mod master_link;
pub mod pages;
pub mod supervisor;
pub mod sweeper;

pub use config_file::{load_config, ConfigError, FileConfig, DEFAULT_CONFIG_PATH};
pub use http_server::{router, run_server, serve, AppState};
pub use master_link::MasterLink;
pub use pages::{PageError, PageSet};
pub use supervisor::{spawn_master, SpawnError};
pub use sweeper::spawn_offense_sweeper;
