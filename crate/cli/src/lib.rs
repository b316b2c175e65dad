pub mod actions;
mod commands;
pub mod error;

pub use commands::{Cli, CliCommands, oidc_cli_main};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::panic_in_result_fn)]
mod tests;
