mod oidc_auth_config;
mod params;

pub use oidc_auth_config::{
    DEFAULT_JWKS_FETCH_TIMEOUT, DEFAULT_JWKS_REFRESH_INTERVAL, DEFAULT_JWKS_REFRESH_RATE_LIMIT,
    DEFAULT_REALM, OidcAuthConfig,
};
pub use params::{JwksCacheParams, RefreshErrorHandler, VerifierParams};
