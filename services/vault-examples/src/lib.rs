//! Vault client samples.
//!
//! Each sample authenticates with one auth method and reads the `password`
//! field of a KV-v2 secret. The quick start writes then reads a secret on a
//! dev server; the renewal sample keeps a token alive until interrupted.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod samples;
pub mod shutdown;

pub use cli::{Cli, Command};
pub use error::SampleError;
