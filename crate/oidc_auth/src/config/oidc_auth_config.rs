use std::path::Path;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{
    error::VerificationError,
    result::{VResult, VResultHelper},
};

/// Realm used by calls that do not name one
pub const DEFAULT_REALM: &str = "community";
/// Scheduled JWKS refresh interval, in seconds
pub const DEFAULT_JWKS_REFRESH_INTERVAL: u64 = 3600;
/// Minimum delay between two refreshes triggered by an unknown key ID, in seconds
pub const DEFAULT_JWKS_REFRESH_RATE_LIMIT: u64 = 300;
/// Timeout of a JWKS or introspection request, in seconds
pub const DEFAULT_JWKS_FETCH_TIMEOUT: u64 = 10;

// Keycloak layout: https://www.keycloak.org/docs/latest/securing_apps/#_oidc-endpoints

#[derive(Debug, Args, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OidcAuthConfig {
    /// The realm used when a verification call does not name one
    #[clap(long, env = "OIDC_DEFAULT_REALM", default_value = DEFAULT_REALM)]
    pub default_realm: String,

    /// The expected issuer (`iss` claim) of the access tokens
    ///
    /// For Keycloak, this is `<base url>/realms/<realm>`.
    /// The issuer is not checked when this is not set.
    #[clap(long, env = "OIDC_JWT_ISSUER_URI")]
    pub jwt_issuer_uri: Option<String>,

    /// The accepted audiences (`aud` claim) of the access tokens
    ///
    /// This argument can be repeated. The audience is not checked when this is not set.
    #[clap(long, env = "OIDC_JWT_AUDIENCE", action = clap::ArgAction::Append)]
    pub jwt_audience: Option<Vec<String>>,

    /// Interval in seconds between two scheduled refreshes of the JWKS
    #[clap(long, env = "OIDC_JWKS_REFRESH_INTERVAL", default_value_t = DEFAULT_JWKS_REFRESH_INTERVAL)]
    pub jwks_refresh_interval: u64,

    /// Minimum delay in seconds between two JWKS refreshes triggered by tokens
    /// signed with an unknown key ID
    #[clap(long, env = "OIDC_JWKS_REFRESH_RATE_LIMIT", default_value_t = DEFAULT_JWKS_REFRESH_RATE_LIMIT)]
    pub jwks_refresh_rate_limit: u64,

    /// Timeout in seconds of the JWKS and introspection requests
    #[clap(long, env = "OIDC_JWKS_FETCH_TIMEOUT", default_value_t = DEFAULT_JWKS_FETCH_TIMEOUT)]
    pub jwks_fetch_timeout: u64,

    /// Refresh the JWKS when a token is signed with an unknown key ID
    #[clap(
        long,
        env = "OIDC_JWKS_REFRESH_UNKNOWN_KID",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub jwks_refresh_unknown_kid: bool,

    /// Clock skew in seconds tolerated on the `exp` and `nbf` claims
    #[clap(long, env = "OIDC_LEEWAY", default_value_t = 0)]
    pub leeway: u64,

    /// Keep the JWKS of each provider cached between calls.
    /// When false, every verification fetches the JWKS again.
    #[clap(
        long,
        env = "OIDC_SHARED_KEY_CACHE",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub shared_key_cache: bool,
}

impl Default for OidcAuthConfig {
    fn default() -> Self {
        Self {
            default_realm: DEFAULT_REALM.to_owned(),
            jwt_issuer_uri: None,
            jwt_audience: None,
            jwks_refresh_interval: DEFAULT_JWKS_REFRESH_INTERVAL,
            jwks_refresh_rate_limit: DEFAULT_JWKS_REFRESH_RATE_LIMIT,
            jwks_fetch_timeout: DEFAULT_JWKS_FETCH_TIMEOUT,
            jwks_refresh_unknown_kid: true,
            leeway: 0,
            shared_key_cache: true,
        }
    }
}

impl OidcAuthConfig {
    /// Load the configuration from a TOML file.
    /// Missing entries take their default value.
    pub fn from_toml(path: &Path) -> VResult<Self> {
        let content = std::fs::read_to_string(path).with_context(VerificationError::MissingConfig, || {
            format!("cannot read the configuration file {}", path.display())
        })?;
        toml::from_str(&content).with_context(VerificationError::MissingConfig, || {
            format!("malformed configuration file {}", path.display())
        })
    }

    /// Write the configuration to a TOML file
    pub fn to_toml(&self, path: &Path) -> VResult<()> {
        let content = toml::to_string(self)
            .context(VerificationError::MissingConfig, "cannot serialize the configuration")?;
        std::fs::write(path, content).with_context(VerificationError::MissingConfig, || {
            format!("cannot write the configuration file {}", path.display())
        })
    }
}
