//! Domain services for pollhub.
//!
//! Services wrap the repositories of `pollhub-db` and own every business rule:
//! credentials and tokens, organization membership, poll lifecycle, choices
//! with media, voting and result visibility.

pub mod services;

pub use services::*;
