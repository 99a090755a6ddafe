//! Vault samples binary.

use clap::Parser;
use vault_examples::{Cli, observability};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(&cli.log_config())?;

    if let Some(output) = cli.run().await? {
        println!("{output}");
    }

    Ok(())
}
