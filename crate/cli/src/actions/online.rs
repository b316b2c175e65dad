use clap::Parser;
use cosmian_oidc_auth::{IntrospectionResult, OidcVerifier};
use tracing::info;

use super::console;
use crate::error::result::CliResult;

/// Verify an access token online, with the introspection endpoint of the provider.
///
/// The introspection result is printed as JSON, including inactive tokens.
#[derive(Parser, Debug)]
#[clap(verbatim_doc_comment)]
pub struct OnlineAction {
    /// The access token, optionally prefixed with `Bearer `
    #[clap(required = true, env = "OIDC_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// The base URL of the identity provider, e.g. `http://localhost:8080`
    #[clap(long, short = 'u', env = "OIDC_BASE_URL")]
    pub base_url: String,

    /// The realm of the provider. The default realm is used when not set
    #[clap(long, short = 'r')]
    pub realm: Option<String>,

    /// The ID of the client authorized to introspect tokens
    #[clap(long, env = "OIDC_CLIENT_ID")]
    pub client_id: String,

    /// The secret of that client
    #[clap(long, env = "OIDC_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,
}

impl OnlineAction {
    /// Introspect the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the introspection request fails.
    pub async fn run(&self, verifier: &OidcVerifier) -> CliResult<IntrospectionResult> {
        let result = verifier
            .verify_online(
                &self.access_token,
                &self.base_url,
                self.realm.as_deref(),
                &self.client_id,
                &self.client_secret,
            )
            .await?;
        info!("token introspected, active: {}", result.active);
        Ok(result)
    }

    pub async fn process(&self, verifier: &OidcVerifier) -> CliResult<()> {
        let result = self.run(verifier).await?;
        console::write_json(&result)
    }
}
