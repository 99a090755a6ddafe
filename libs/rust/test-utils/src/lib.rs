//! Shared test utilities for the Vault client crates.
//!
//! This crate provides:
//! - Proptest generators for paths, tokens and secret payloads
//! - A wiremock-backed mock Vault server
//! - Canned Vault API response bodies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
pub use mocks::MockVault;
