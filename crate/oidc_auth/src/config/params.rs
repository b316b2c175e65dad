use std::{fmt, sync::Arc, time::Duration};

use super::{
    DEFAULT_JWKS_FETCH_TIMEOUT, DEFAULT_JWKS_REFRESH_INTERVAL, DEFAULT_JWKS_REFRESH_RATE_LIMIT,
    DEFAULT_REALM, OidcAuthConfig,
};
use crate::{error::VerificationError, oidc_ensure};

/// Called with the error of a background JWKS refresh.
/// The stale key set stays in use.
pub type RefreshErrorHandler = Arc<dyn Fn(&VerificationError) + Send + Sync>;

/// Parameters of a JWKS cache
#[derive(Clone)]
pub struct JwksCacheParams {
    pub refresh_interval: Duration,
    pub refresh_rate_limit: Duration,
    pub fetch_timeout: Duration,
    pub refresh_unknown_kid: bool,
    pub refresh_error_handler: RefreshErrorHandler,
}

impl JwksCacheParams {
    #[must_use]
    pub fn with_refresh_error_handler(mut self, handler: RefreshErrorHandler) -> Self {
        self.refresh_error_handler = handler;
        self
    }
}

fn log_refresh_error() -> RefreshErrorHandler {
    Arc::new(|e: &VerificationError| {
        tracing::warn!("background JWKS refresh failed, keeping the current key set: {e}");
    })
}

impl Default for JwksCacheParams {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_JWKS_REFRESH_INTERVAL),
            refresh_rate_limit: Duration::from_secs(DEFAULT_JWKS_REFRESH_RATE_LIMIT),
            fetch_timeout: Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT),
            refresh_unknown_kid: true,
            refresh_error_handler: log_refresh_error(),
        }
    }
}

impl fmt::Debug for JwksCacheParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwksCacheParams")
            .field("refresh_interval", &self.refresh_interval)
            .field("refresh_rate_limit", &self.refresh_rate_limit)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("refresh_unknown_kid", &self.refresh_unknown_kid)
            .finish_non_exhaustive()
    }
}

/// The validated parameters of an `OidcVerifier`
#[derive(Debug, Clone)]
pub struct VerifierParams {
    pub default_realm: String,
    pub jwt_issuer_uri: Option<String>,
    pub jwt_audience: Option<Vec<String>>,
    pub leeway: Duration,
    pub shared_key_cache: bool,
    pub jwks: JwksCacheParams,
}

impl Default for VerifierParams {
    fn default() -> Self {
        Self {
            default_realm: DEFAULT_REALM.to_owned(),
            jwt_issuer_uri: None,
            jwt_audience: None,
            leeway: Duration::ZERO,
            shared_key_cache: true,
            jwks: JwksCacheParams::default(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl TryFrom<OidcAuthConfig> for VerifierParams {
    type Error = VerificationError;

    fn try_from(conf: OidcAuthConfig) -> Result<Self, Self::Error> {
        let default_realm = conf.default_realm.trim().to_owned();
        oidc_ensure!(
            !default_realm.is_empty(),
            MissingConfig,
            "the default realm cannot be empty"
        );
        oidc_ensure!(
            conf.jwks_fetch_timeout > 0,
            MissingConfig,
            "the JWKS fetch timeout must be greater than 0"
        );
        oidc_ensure!(
            conf.jwks_refresh_interval > 0,
            MissingConfig,
            "the JWKS refresh interval must be greater than 0"
        );

        let jwt_audience = conf.jwt_audience.and_then(|audiences| {
            let audiences: Vec<String> = audiences
                .into_iter()
                .filter_map(|a| non_empty(Some(a)))
                .collect();
            (!audiences.is_empty()).then_some(audiences)
        });

        Ok(Self {
            default_realm,
            jwt_issuer_uri: non_empty(conf.jwt_issuer_uri),
            jwt_audience,
            leeway: Duration::from_secs(conf.leeway),
            shared_key_cache: conf.shared_key_cache,
            jwks: JwksCacheParams {
                refresh_interval: Duration::from_secs(conf.jwks_refresh_interval),
                refresh_rate_limit: Duration::from_secs(conf.jwks_refresh_rate_limit),
                fetch_timeout: Duration::from_secs(conf.jwks_fetch_timeout),
                refresh_unknown_kid: conf.jwks_refresh_unknown_kid,
                refresh_error_handler: log_refresh_error(),
            },
        })
    }
}
