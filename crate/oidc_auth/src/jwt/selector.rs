//! Selection of the key that must verify a token.
//!
//! The key is looked up by the `kid` of the token header. There is no algorithm
//! negotiation: the header algorithm must be the one the key declares, or, for keys
//! that declare none, an algorithm of the key family.

use std::sync::Arc;

use jsonwebtoken::Algorithm;
use tracing::{debug, trace};

use super::UnverifiedHeader;
use crate::{
    error::VerificationError,
    jwks::{KeySetCache, SigningKey},
    oidc_bail, oidc_ensure,
    result::{VResult, VResultHelper},
};

/// Select the key of `cache` that must verify a token with this `header`.
///
/// An unknown key ID triggers a refresh of the cache, rate limited, and a single
/// retry of the lookup.
pub async fn select(
    header: &UnverifiedHeader,
    cache: &Arc<KeySetCache>,
) -> VResult<Arc<SigningKey>> {
    let Some(kid) = header.kid.as_deref() else {
        oidc_bail!(ParseFailure, "the token header has no key ID (kid)")
    };
    oidc_ensure!(
        !matches!(
            header.alg,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ),
        SelectionFailure,
        "symmetric algorithm {:?} is not accepted",
        header.alg
    );
    trace!("selecting key `{kid}` for algorithm {:?}", header.alg);

    let key_set = cache.ensure_fresh().await?;
    let key = match key_set.find(kid) {
        Some(key) => key,
        None => {
            debug!("unknown key ID `{kid}` in JWKS at {}", cache.jwks_uri());
            cache
                .refresh_for_unknown_kid(&key_set)
                .await
                .find(kid)
                .with_context(VerificationError::SelectionFailure, || {
                    format!("no key with ID `{kid}` in JWKS at {}", cache.jwks_uri())
                })?
        }
    };

    oidc_ensure!(
        key.accepts(header.alg),
        SelectionFailure,
        "key `{kid}` does not accept algorithm {:?}",
        header.alg
    );
    Ok(key)
}
