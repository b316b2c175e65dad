use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::Algorithm;
use serde_json::{Map, Value};

use crate::{
    error::VerificationError,
    oidc_ensure, oidc_error,
    result::{VResult, VResultHelper},
};

/// The header of a compact JWT, decoded without any signature check
#[derive(Debug, Clone, PartialEq)]
pub struct UnverifiedHeader {
    pub alg: Algorithm,
    pub kid: Option<String>,
    /// All the header fields, as found in the token
    pub raw: Map<String, Value>,
}

impl UnverifiedHeader {
    /// Decode the header of `token`.
    ///
    /// Fails with a `ParseFailure` when the token is not made of three non-empty
    /// segments, when the header is not base64url encoded JSON, or when its algorithm
    /// is unknown.
    pub fn decode(token: &str) -> VResult<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        oidc_ensure!(
            segments.len() == 3,
            ParseFailure,
            "malformed token: expected 3 segments, found {}",
            segments.len()
        );
        oidc_ensure!(
            segments.iter().all(|segment| !segment.is_empty()),
            ParseFailure,
            "malformed token: empty segment"
        );

        let raw_header = URL_SAFE_NO_PAD
            .decode(segments[0])
            .context(VerificationError::ParseFailure, "invalid token header encoding")?;
        let raw: Map<String, Value> = serde_json::from_slice(&raw_header)
            .context(VerificationError::ParseFailure, "invalid token header")?;
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| oidc_error!(ParseFailure, "invalid token header: {e}"))?;

        Ok(Self {
            alg: header.alg,
            kid: header.kid,
            raw,
        })
    }
}
