//! Domain layer for gateway-relay.
//!
//! The domain layer contains plain data types that describe how the relay is
//! configured.  Nothing here reads files, opens sockets, or spawns tasks.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `axum` types
//! - TOML parsing or environment variable reading (that is infrastructure)

pub mod config;

pub use config::{LinkSettings, MasterCommand, MasterEndpoint, PageSources, RelayConfig};
