//! Shared test utilities for the DuoKey SDK crates.
//!
//! This crate provides:
//! - A stub OIDC identity provider on a `wiremock` server
//! - A counting in-memory transport
//! - Proptest generators for tenants, operations and payloads
//! - Fixtures with sample credentials and data

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
