use std::process;

use clap::Parser;
use cosmian_logger::log_init;
use cosmian_oidc_cli::{Cli, oidc_cli_main};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    log_init(cli.log_filter.as_deref());

    if let Some(err) = oidc_cli_main(cli).await.err() {
        eprintln!("ERROR: {err}");
        process::exit(1);
    }
}
