//! gateway-relay library crate.
//!
//! This crate provides the HTTP-facing authorization relay: clients post a
//! shared password, and on success the relay tells the privileged master
//! process to grant the client's IP address access.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser / gateway-cli (form POST over HTTP)
//!         ↕
//! [gateway-relay]
//!   ├── domain/            Pure types: RelayConfig and its settings
//!   ├── application/       Authorization orchestration + the GatewayLink seam
//!   └── infrastructure/
//!         ├── http_server/ axum routes and status mapping
//!         ├── master_link/ Resilient TCP link to the master (gateway-core codec)
//!         ├── config_file/ TOML configuration loading
//!         ├── pages/       HTML page templates
//!         ├── sweeper/     Periodic offense-record cleanup
//!         └── supervisor/  Launches the master and aborts if it dies
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `gateway-core` only; it talks to the
//!   master exclusively through the [`application::GatewayLink`] trait.
//! - `infrastructure` depends on all other layers plus `tokio` and `axum`.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: the authorization use case.
pub mod application;

/// Infrastructure layer: HTTP server, master link, config, pages, supervision.
pub mod infrastructure;
