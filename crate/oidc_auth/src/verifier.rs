use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::{
    config::{OidcAuthConfig, VerifierParams},
    error::VerificationError,
    introspection::{IntrospectionResult, introspect},
    jwks::{JwksRegistry, KeySetCache},
    jwt::{TokenValidator, UnverifiedHeader, VerificationResult},
    oidc_ensure, oidc_error,
    result::{VResult, VResultHelper},
};

const BEARER_PREFIX: &str = "bearer ";

/// Verification of bearer access tokens issued by an OpenID Connect provider
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `access_token` locally, against the JWKS of `realm` at `base_url`.
    /// The default realm is used when `realm` is `None`.
    async fn verify_offline(
        &self,
        access_token: &str,
        base_url: &str,
        realm: Option<&str>,
    ) -> VResult<VerificationResult>;

    /// Ask the introspection endpoint of `realm` at `base_url` whether `access_token` is active.
    async fn verify_online(
        &self,
        access_token: &str,
        base_url: &str,
        realm: Option<&str>,
        client_id: &str,
        client_secret: &str,
    ) -> VResult<IntrospectionResult>;
}

/// Strip an optional, case insensitive, `Bearer ` scheme prefix
pub(crate) fn strip_bearer_prefix(token: &str) -> &str {
    match token.get(..BEARER_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_PREFIX) => token
            .get(BEARER_PREFIX.len()..)
            .unwrap_or_default()
            .trim_start(),
        _ => token,
    }
}

fn access_token(raw: &str) -> VResult<&str> {
    let token = strip_bearer_prefix(raw.trim_start()).trim_end();
    oidc_ensure!(
        !token.is_empty(),
        EmptyInput,
        "cannot get a valid access token"
    );
    Ok(token)
}

fn base_url(raw: &str) -> VResult<&str> {
    let base_url = raw.trim();
    oidc_ensure!(
        !base_url.is_empty(),
        MissingConfig,
        "cannot get a valid keycloak base url"
    );
    Ok(base_url)
}

/// `{base_url}/realms/{realm}/protocol/openid-connect/{endpoint}`
fn realm_endpoint(base_url: &str, realm: &str, endpoint: &[&str]) -> VResult<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| oidc_error!(MissingConfig, "cannot get a valid keycloak base url: {e}"))?;
    url.path_segments_mut()
        .map_err(|()| oidc_error!(MissingConfig, "cannot get a valid keycloak base url: {base_url}"))?
        .pop_if_empty()
        .extend(["realms", realm, "protocol", "openid-connect"])
        .extend(endpoint);
    Ok(url.to_string())
}

/// The JWKS URL of a Keycloak realm
pub fn jwks_uri(base_url: &str, realm: &str) -> VResult<String> {
    realm_endpoint(base_url, realm, &["certs"])
}

/// The token introspection URL of a Keycloak realm
pub fn introspect_uri(base_url: &str, realm: &str) -> VResult<String> {
    realm_endpoint(base_url, realm, &["token", "introspect"])
}

/// Verifies access tokens offline, against cached JWKS, or online, by introspection.
///
/// Dropping the verifier stops the background refresh of its JWKS caches.
pub struct OidcVerifier {
    params: VerifierParams,
    client: Client,
    registry: JwksRegistry,
    validator: TokenValidator,
}

impl OidcVerifier {
    pub fn new(params: VerifierParams) -> VResult<Self> {
        let client = Client::builder()
            .build()
            .context(VerificationError::MissingConfig, "cannot build the HTTP client")?;
        debug!(
            "OIDC verifier: default realm `{}`, shared key cache: {}",
            params.default_realm, params.shared_key_cache
        );
        Ok(Self {
            validator: TokenValidator::from(&params),
            registry: JwksRegistry::new(params.jwks.clone(), client.clone()),
            client,
            params,
        })
    }

    pub fn from_config(config: OidcAuthConfig) -> VResult<Self> {
        Self::new(VerifierParams::try_from(config)?)
    }

    #[must_use]
    pub const fn params(&self) -> &VerifierParams {
        &self.params
    }

    #[must_use]
    pub const fn registry(&self) -> &JwksRegistry {
        &self.registry
    }

    fn realm<'a>(&'a self, realm: Option<&'a str>) -> VResult<&'a str> {
        let Some(realm) = realm else {
            return Ok(self.params.default_realm.as_str())
        };
        let realm = realm.trim();
        oidc_ensure!(!realm.is_empty(), MissingConfig, "cannot get a valid realm");
        Ok(realm)
    }

    /// Verify `access_token` locally, against the JWKS of `realm` at `base_url`.
    ///
    /// The token may carry a `Bearer ` prefix. The default realm is used when `realm` is `None`.
    pub async fn verify_offline(
        &self,
        access_token: &str,
        base_url: &str,
        realm: Option<&str>,
    ) -> VResult<VerificationResult> {
        let token = self::access_token(access_token)?;
        let base_url = self::base_url(base_url)?;
        let realm = self.realm(realm)?;
        let jwks_uri = jwks_uri(base_url, realm)?;
        // nothing is cached for a token that cannot be parsed
        let header = UnverifiedHeader::decode(token)?;

        if self.params.shared_key_cache {
            let cache = self.registry.acquire(&jwks_uri);
            let result = self
                .validator
                .validate_with_header(token, header, &cache)
                .await;
            self.registry.release(cache);
            result
        } else {
            let cache = KeySetCache::new(jwks_uri, self.params.jwks.clone(), self.client.clone());
            let result = self
                .validator
                .validate_with_header(token, header, &cache)
                .await;
            cache.teardown();
            result
        }
    }

    /// Ask the introspection endpoint of `realm` at `base_url` whether `access_token` is active.
    ///
    /// An inactive token is returned as such, not as an error.
    pub async fn verify_online(
        &self,
        access_token: &str,
        base_url: &str,
        realm: Option<&str>,
        client_id: &str,
        client_secret: &str,
    ) -> VResult<IntrospectionResult> {
        let token = self::access_token(access_token)?;
        let client_id = client_id.trim();
        oidc_ensure!(
            !client_id.is_empty(),
            MissingConfig,
            "cannot get a valid client ID"
        );
        oidc_ensure!(
            !client_secret.is_empty(),
            MissingConfig,
            "cannot get a valid client secret"
        );
        let base_url = self::base_url(base_url)?;
        let realm = self.realm(realm)?;
        let introspect_uri = introspect_uri(base_url, realm)?;

        introspect(
            &self.client,
            &introspect_uri,
            self.params.jwks.fetch_timeout,
            client_id,
            client_secret,
            token,
        )
        .await
    }

    /// Stop the background refresh of every JWKS cache. Idempotent.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

#[async_trait]
impl TokenVerifier for OidcVerifier {
    async fn verify_offline(
        &self,
        access_token: &str,
        base_url: &str,
        realm: Option<&str>,
    ) -> VResult<VerificationResult> {
        Self::verify_offline(self, access_token, base_url, realm).await
    }

    async fn verify_online(
        &self,
        access_token: &str,
        base_url: &str,
        realm: Option<&str>,
        client_id: &str,
        client_secret: &str,
    ) -> VResult<IntrospectionResult> {
        Self::verify_online(self, access_token, base_url, realm, client_id, client_secret).await
    }
}
