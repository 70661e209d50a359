//! Domain entities for the access gateway.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the gateway is the set of rules that make it what it
//! is: how many wrong passwords an address may submit, how long a lockout
//! lasts, and when a streak of failures is forgotten.  None of that needs a
//! socket or a web framework, so it lives here and can be tested on any
//! machine without setup.

/// Time source abstraction so lockout windows can be tested without sleeping.
pub mod clock;

/// Per-IP offense tracking and the four-state timeout machine.
///
/// See [`offense::OffenseTracker`] for the main type.
pub mod offense;
