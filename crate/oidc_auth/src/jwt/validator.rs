use std::{sync::Arc, time::Duration};

use jsonwebtoken::{Algorithm, Validation};
use serde_json::{Map, Value};
use tracing::trace;

use super::{UnverifiedHeader, VerificationResult, selector};
use crate::{config::VerifierParams, error::VerificationError, jwks::KeySetCache, result::VResult};

/// Verifies the signature and the registered claims of compact JWTs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenValidator {
    issuer: Option<String>,
    audience: Option<Vec<String>>,
    leeway: Duration,
}

impl TokenValidator {
    #[must_use]
    pub const fn new(issuer: Option<String>, audience: Option<Vec<String>>, leeway: Duration) -> Self {
        Self {
            issuer,
            audience,
            leeway,
        }
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        // `exp` and `nbf` are checked when present
        validation.required_spec_claims.clear();
        validation.leeway = self.leeway.as_secs();
        validation.validate_nbf = true;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(audience.as_slice()),
            None => validation.validate_aud = false,
        }
        validation
    }

    /// Validate `token` against the keys of `cache`.
    ///
    /// Key selection failures are reported as `ParseFailure`.
    pub async fn validate(
        &self,
        token: &str,
        cache: &Arc<KeySetCache>,
    ) -> VResult<VerificationResult> {
        let header = UnverifiedHeader::decode(token)?;
        self.validate_with_header(token, header, cache).await
    }

    /// Validate `token`, whose header was already decoded, against the keys of `cache`
    pub async fn validate_with_header(
        &self,
        token: &str,
        header: UnverifiedHeader,
        cache: &Arc<KeySetCache>,
    ) -> VResult<VerificationResult> {
        trace!("token header: alg {:?}, kid {:?}", header.alg, header.kid);

        let key = selector::select(&header, cache)
            .await
            .map_err(VerificationError::selection_as_parse_failure)?;

        let token_data = jsonwebtoken::decode::<Map<String, Value>>(
            token,
            key.decoding_key(),
            &self.validation(header.alg),
        )
        .map_err(|e| VerificationError::from(e).selection_as_parse_failure())?;
        trace!("token verified with key `{}`", key.kid());

        Ok(VerificationResult::valid(header.raw, token_data.claims))
    }
}

impl From<&VerifierParams> for TokenValidator {
    fn from(params: &VerifierParams) -> Self {
        Self::new(
            params.jwt_issuer_uri.clone(),
            params.jwt_audience.clone(),
            params.leeway,
        )
    }
}
