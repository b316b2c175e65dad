use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cosmian_oidc_auth::{OidcVerifier, config::OidcAuthConfig};
use tracing::info;

use crate::{
    actions::{offline::OfflineAction, online::OnlineAction},
    cli_ensure,
    error::result::CliResult,
};

#[derive(Parser)]
#[command(name = "cosmian_oidc", version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file of the verifier.
    /// When set, the verifier options given on the command line are ignored.
    #[clap(long, env = "OIDC_CONF", global = true)]
    pub conf: Option<PathBuf>,

    /// Logging filter, e.g. `debug` or `info,cosmian_oidc_auth=trace`.
    /// Falls back to `RUST_LOG`.
    #[clap(long, global = true)]
    pub log_filter: Option<String>,

    #[clap(flatten)]
    pub auth: OidcAuthConfig,

    #[command(subcommand)]
    pub command: CliCommands,
}

#[derive(Subcommand)]
pub enum CliCommands {
    Offline(OfflineAction),
    Online(OnlineAction),
}

impl Cli {
    /// The configuration of the verifier: from the `--conf` file if any,
    /// from the command line and the environment otherwise.
    pub fn auth_config(&self) -> CliResult<OidcAuthConfig> {
        let Some(path) = &self.conf else {
            return Ok(self.auth.clone())
        };
        cli_ensure!(
            path.exists(),
            "the configuration file {} does not exist",
            path.display()
        );
        info!("reading the verifier configuration from {}", path.display());
        Ok(OidcAuthConfig::from_toml(path)?)
    }
}

pub async fn oidc_cli_main(cli: Cli) -> CliResult<()> {
    let verifier = OidcVerifier::from_config(cli.auth_config()?)?;
    let result = match &cli.command {
        CliCommands::Offline(action) => action.process(&verifier).await,
        CliCommands::Online(action) => action.process(&verifier).await,
    };
    verifier.shutdown();
    result
}
