use clap::Parser;
use cosmian_oidc_auth::{OidcVerifier, VerificationResult};
use tracing::info;

use super::console;
use crate::error::result::CliResult;

/// Verify an access token offline, against the JWKS of the provider.
///
/// The verification result is printed as JSON.
/// The command fails when the token is not valid.
#[derive(Parser, Debug)]
#[clap(verbatim_doc_comment)]
pub struct OfflineAction {
    /// The access token, optionally prefixed with `Bearer `
    #[clap(required = true, env = "OIDC_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// The base URL of the identity provider, e.g. `http://localhost:8080`
    #[clap(long, short = 'u', env = "OIDC_BASE_URL")]
    pub base_url: String,

    /// The realm of the provider. The default realm is used when not set
    #[clap(long, short = 'r')]
    pub realm: Option<String>,
}

impl OfflineAction {
    /// Verify the token and print the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the token does not verify or the result cannot be printed.
    pub async fn run(&self, verifier: &OidcVerifier) -> CliResult<VerificationResult> {
        let result = verifier
            .verify_offline(&self.access_token, &self.base_url, self.realm.as_deref())
            .await?;
        info!(
            "token verified offline, subject: {}",
            result
                .claim("sub")
                .and_then(|sub| sub.as_str())
                .unwrap_or("unknown")
        );
        Ok(result)
    }

    pub async fn process(&self, verifier: &OidcVerifier) -> CliResult<()> {
        let result = self.run(verifier).await?;
        console::write_json(&result)
    }
}
