//! Online verification through the token introspection endpoint of the provider.
//!
//! One form encoded POST per call, no caching and no retry.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::VerificationError,
    jwt::KeycloakClaims,
    result::{VResult, VResultHelper},
};

/// The answer of the introspection endpoint.
///
/// An inactive token is not an error: the caller decides what to do with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionResult {
    pub active: bool,
    #[serde(flatten)]
    pub claims: KeycloakClaims,
}

#[derive(Serialize)]
struct IntrospectionRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    token: &'a str,
}

/// Ask the provider at `introspect_uri` whether `token` is active.
///
/// Transport errors, timeouts and non success status codes are `FetchFailure`s;
/// a body that cannot be decoded is a `ParseFailure`.
pub(crate) async fn introspect(
    client: &Client,
    introspect_uri: &str,
    timeout: Duration,
    client_id: &str,
    client_secret: &str,
    token: &str,
) -> VResult<IntrospectionResult> {
    debug!("introspecting token of client `{client_id}` at {introspect_uri}");
    let response = client
        .post(introspect_uri)
        .timeout(timeout)
        .form(&IntrospectionRequest {
            client_id,
            client_secret,
            token,
        })
        .send()
        .await
        .with_context(VerificationError::FetchFailure, || {
            format!("introspection request to {introspect_uri} failed")
        })?
        .error_for_status()
        .with_context(VerificationError::FetchFailure, || {
            format!("introspection request to {introspect_uri} failed")
        })?;

    let body = response
        .bytes()
        .await
        .with_context(VerificationError::FetchFailure, || {
            format!("cannot read the introspection response of {introspect_uri}")
        })?;
    let result: IntrospectionResult = serde_json::from_slice(&body)
        .context(VerificationError::ParseFailure, "cannot decode the introspection response")?;
    debug!("introspection result: active {}", result.active);
    Ok(result)
}
