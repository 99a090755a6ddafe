//! Command-line interface: one subcommand per sample.

use crate::{
    config,
    observability::LogConfig,
    samples::{
        self, APPROLE_ROLE_ID_ENV, AppRoleSample, AwsIamSample, AzureSample, DEFAULT_SECRET_PATH,
        GcpIamSample, KubernetesSample, QuickStartSample, RenewTokenSample, USERPASS_PASSWORD_ENV,
        UserpassSample,
    },
    shutdown,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};
use vault_client::{CredentialSource, auth::DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH};

/// Authenticate to Vault and read a secret.
#[derive(Parser, Debug)]
#[command(name = "vault-examples", version, about)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// KV-v2 secret read by the auth samples
    #[arg(long, global = true, default_value = DEFAULT_SECRET_PATH)]
    pub secret_path: String,

    /// Sample to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available samples.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a secret to a dev server and read it back
    QuickStart,

    /// Log in with username and password
    HelloWorld {
        /// Vault user
        #[arg(long, default_value = "my-user")]
        username: String,
        /// Variable holding the password
        #[arg(long, default_value = USERPASS_PASSWORD_ENV)]
        password_env: String,
    },

    /// Log in with the token from `VAULT_TOKEN`
    Token,

    /// Log in with AppRole and a response-wrapped secret ID
    Approle {
        /// Role ID
        #[arg(long, env = APPROLE_ROLE_ID_ENV)]
        role_id: Option<String>,
        /// File holding the wrapping token
        #[arg(long, default_value = "path/to/wrapping-token")]
        wrapping_token_file: PathBuf,
    },

    /// Log in with AWS IAM credentials
    AwsIam {
        /// Vault role
        #[arg(long, default_value = "dev-role-iam")]
        role: String,
        /// STS signing region
        #[arg(long)]
        region: Option<String>,
        /// Value for the IAM server ID header
        #[arg(long)]
        server_id_header: Option<String>,
    },

    /// Log in with an Azure managed identity
    Azure {
        /// Vault role
        #[arg(long, default_value = "dev-role-azure")]
        role: String,
    },

    /// Log in with a GCP service account
    GcpIam {
        /// Vault role
        #[arg(long, default_value = "dev-role-iam")]
        role: String,
        /// Service account email; derived from `GCP_SERVICE_ACCOUNT_NAME`
        /// and `GOOGLE_CLOUD_PROJECT` when unset
        #[arg(long)]
        service_account_email: Option<String>,
        /// Service account key file
        #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
        credentials_file: Option<PathBuf>,
    },

    /// Log in with a Kubernetes service account token
    Kubernetes {
        /// Vault role
        #[arg(long, default_value = "dev-role-k8s")]
        role: String,
        /// Service account token file
        #[arg(long, default_value = DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH)]
        token_path: PathBuf,
    },

    /// Log in with userpass and keep the token renewed until interrupted
    RenewToken {
        /// Vault user
        #[arg(long, default_value = "my-user")]
        username: String,
        /// Variable holding the password; a fixed dev password when unset
        #[arg(long)]
        password_env: Option<String>,
        /// Seconds requested on each renewal
        #[arg(long, default_value_t = 3600)]
        increment_secs: u64,
    },
}

impl Cli {
    /// Logging settings from the global flags.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            json: self.json_logs,
            default_level: self.log_level.clone(),
        }
    }

    /// Run the selected sample. Returns the line to print, if any.
    ///
    /// # Errors
    ///
    /// Propagates the sample's error with its context chain.
    pub async fn run(self) -> anyhow::Result<Option<String>> {
        let secret_path = self.secret_path;

        let output = match self.command {
            Command::QuickStart => {
                let config = config::load_quick_start()?;
                samples::quick_start(&config, &QuickStartSample::default()).await?
            }
            Command::HelloWorld {
                username,
                password_env,
            } => {
                let sample = UserpassSample {
                    username,
                    password: CredentialSource::from_env(password_env),
                    secret_path,
                };
                samples::get_secret_with_userpass(&config::load()?, &sample).await?
            }
            Command::Token => {
                let config = config::load()?;
                let token = config
                    .token
                    .clone()
                    .context("no token was provided in VAULT_TOKEN env var")?;
                samples::get_secret_with_token(&config, &token, &secret_path).await?
            }
            Command::Approle {
                role_id,
                wrapping_token_file,
            } => {
                let sample = AppRoleSample {
                    role_id,
                    wrapping_token_file,
                    secret_path,
                };
                samples::get_secret_with_approle(&config::load()?, &sample).await?
            }
            Command::AwsIam {
                role,
                region,
                server_id_header,
            } => {
                let sample = AwsIamSample {
                    role,
                    region,
                    server_id_header,
                    secret_path,
                    ..AwsIamSample::default()
                };
                samples::get_secret_with_aws_iam(&config::load()?, &sample).await?
            }
            Command::Azure { role } => {
                let sample = AzureSample {
                    role,
                    secret_path,
                    ..AzureSample::default()
                };
                samples::get_secret_with_azure(&config::load()?, &sample).await?
            }
            Command::GcpIam {
                role,
                service_account_email,
                credentials_file,
            } => {
                let email = service_account_email
                    .or_else(|| GcpIamSample::service_account_email_from(|k| std::env::var(k).ok()))
                    .context(
                        "no service account email given and GCP_SERVICE_ACCOUNT_NAME or GOOGLE_CLOUD_PROJECT is unset",
                    )?;
                let sample = GcpIamSample {
                    role,
                    credentials_file,
                    secret_path,
                    ..GcpIamSample::new(email)
                };
                samples::get_secret_with_gcp_iam(&config::load()?, &sample).await?
            }
            Command::Kubernetes { role, token_path } => {
                let sample = KubernetesSample {
                    role,
                    token_path,
                    secret_path,
                };
                samples::get_secret_with_kubernetes(&config::load()?, &sample).await?
            }
            Command::RenewToken {
                username,
                password_env,
                increment_secs,
            } => {
                let mut sample = RenewTokenSample {
                    username,
                    increment: Duration::from_secs(increment_secs),
                    ..RenewTokenSample::default()
                };
                if let Some(var) = password_env {
                    sample.password = CredentialSource::from_env(var);
                }
                samples::renew_token(&config::load()?, &sample, shutdown::wait_for_signal()).await?;
                return Ok(None);
            }
        };

        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vault-examples",
            "kubernetes",
            "--json-logs",
            "--secret-path",
            "kv-v2/data/app",
        ])
        .unwrap();
        assert!(cli.json_logs);
        assert_eq!(cli.secret_path, "kv-v2/data/app");
        assert!(matches!(
            cli.command,
            Command::Kubernetes { ref role, .. } if role == "dev-role-k8s"
        ));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["vault-examples", "renew-token"]).unwrap();
        assert_eq!(cli.secret_path, DEFAULT_SECRET_PATH);
        assert_eq!(cli.log_config().default_level, "info");
        match cli.command {
            Command::RenewToken {
                username,
                password_env,
                increment_secs,
            } => {
                assert_eq!(username, "my-user");
                assert!(password_env.is_none());
                assert_eq!(increment_secs, 3600);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_sample_rejected() {
        assert!(Cli::try_parse_from(["vault-examples", "ldap"]).is_err());
    }
}
