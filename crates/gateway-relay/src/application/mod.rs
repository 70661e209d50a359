//! Application layer for gateway-relay.
//!
//! The application layer knows *what* happens when a client submits a
//! password, and delegates *how* the master is reached to the infrastructure
//! layer through the [`GatewayLink`] trait.
//!
//! # Responsibilities
//!
//! - Validating the submitted password/expiration form fields
//! - Consulting and updating the offense tracker
//! - Deciding between grant, client error, policy rejection and backend failure
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or reconnecting (that is infrastructure)
//! - HTTP status codes and page rendering (also infrastructure)

pub mod authorize;
pub mod gateway_link;

pub use authorize::{parse_expiration, AuthorizationService, AuthorizeError, ErrorKind, Granted};
pub use gateway_link::{GatewayLink, LinkError, LinkHealth};
