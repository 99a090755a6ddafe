//! HashiCorp Vault client.
//!
//! Authenticates through pluggable auth methods (token, userpass, AppRole,
//! AWS, Azure, GCP, Kubernetes), reads and writes KV-v2 secrets, and keeps
//! tokens alive with a lifetime watcher. Requests go through a circuit
//! breaker and a retry policy.

pub mod auth;
pub mod breaker;
pub mod cache;
pub mod client;
pub mod config;
pub mod credential;
pub mod database;
pub mod error;
pub mod http;
pub mod kv2;
pub mod lifetime;
pub mod provider;
pub mod renewal;
pub mod retry;
pub mod secrets;
pub mod sys;

pub use auth::{
    AppRoleAuth, AuthMethod, AwsAuth, AwsAuthType, AwsCredentials, AzureAuth, GcpAuth,
    GcpAuthType, KubernetesAuth, TokenAuth, UserpassAuth,
};
pub use cache::SecretCache;
pub use client::VaultClient;
pub use config::VaultConfig;
pub use credential::CredentialSource;
pub use database::DatabaseEngine;
pub use error::{VaultError, VaultResult};
pub use kv2::{Kv2, KvMetadata, KvSecret, KvVersionMetadata};
pub use lifetime::{LifetimeWatcher, LifetimeWatcherInput, RenewBehavior, RenewalOutput};
pub use provider::{DatabaseCredentialProvider, DatabaseCredentials, SecretMetadata, SecretProvider};
pub use renewal::{RenewalError, manage_token_lifecycle, renew_token_forever};
pub use secrets::Secret;
