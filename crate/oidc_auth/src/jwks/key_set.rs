use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm, PublicKeyUse},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{oidc_bail, oidc_error, result::VResult};

/// The kind of public key held by a `SigningKey`.
/// Used to check a token algorithm against keys that do not declare one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    EcP256,
    EcP384,
    Ed25519,
}

impl KeyFamily {
    fn of(params: &AlgorithmParameters) -> Option<Self> {
        match params {
            AlgorithmParameters::RSA(_) => Some(Self::Rsa),
            AlgorithmParameters::EllipticCurve(ec) => match ec.curve {
                EllipticCurve::P256 => Some(Self::EcP256),
                EllipticCurve::P384 => Some(Self::EcP384),
                _ => None,
            },
            AlgorithmParameters::OctetKeyPair(okp) => {
                matches!(okp.curve, EllipticCurve::Ed25519).then_some(Self::Ed25519)
            }
            // symmetric secrets are never accepted from a JWKS
            _ => None,
        }
    }

    /// Whether a signature algorithm can be verified with a key of this family
    #[must_use]
    pub const fn accepts(self, alg: Algorithm) -> bool {
        matches!(
            (self, alg),
            (
                Self::Rsa,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ) | (Self::EcP256, Algorithm::ES256)
                | (Self::EcP384, Algorithm::ES384)
                | (Self::Ed25519, Algorithm::EdDSA)
        )
    }
}

/// Map the `alg` of a JWK to the asymmetric signature algorithm it declares.
/// Symmetric and key-encryption algorithms map to `None`.
fn signature_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// A public key of the identity provider, usable to verify token signatures
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Option<Algorithm>,
    family: KeyFamily,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Build a signing key from a published JWK.
    ///
    /// Keys without a `kid`, published for encryption, of an unsupported type,
    /// or declaring an algorithm that does not fit their type are rejected.
    pub fn from_jwk(jwk: &Jwk) -> VResult<Self> {
        let Some(kid) = jwk.common.key_id.clone() else {
            oidc_bail!(ParseFailure, "JWK without a key ID")
        };
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            oidc_bail!(ParseFailure, "JWK `{kid}` is an encryption key")
        }
        let family = KeyFamily::of(&jwk.algorithm)
            .ok_or_else(|| oidc_error!(ParseFailure, "JWK `{kid}` has an unsupported key type"))?;
        let algorithm = match jwk.common.key_algorithm.as_ref() {
            None => None,
            Some(declared) => {
                let alg = signature_algorithm(declared).ok_or_else(|| {
                    oidc_error!(
                        ParseFailure,
                        "JWK `{kid}` declares a non signature algorithm: {declared:?}"
                    )
                })?;
                if !family.accepts(alg) {
                    oidc_bail!(
                        ParseFailure,
                        "JWK `{kid}` declares {alg:?} which does not fit a {family:?} key"
                    )
                }
                Some(alg)
            }
        };
        let decoding_key = DecodingKey::from_jwk(jwk)
            .map_err(|e| oidc_error!(ParseFailure, "JWK `{kid}` is not a valid key: {e}"))?;

        Ok(Self {
            kid,
            algorithm,
            family,
            decoding_key,
        })
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The algorithm declared by the JWK, if any
    #[must_use]
    pub const fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    #[must_use]
    pub const fn family(&self) -> KeyFamily {
        self.family
    }

    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// A key verifies only the algorithm it declares.
    /// A key that declares none verifies the algorithms of its family.
    #[must_use]
    pub fn accepts(&self, alg: Algorithm) -> bool {
        self.algorithm
            .map_or_else(|| self.family.accepts(alg), |declared| declared == alg)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

/// A snapshot of the signing keys published at a JWKS URL
#[derive(Debug)]
pub struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: DateTime<Utc>,
    source: String,
}

impl KeySet {
    /// Parse a JWKS document fetched from `source`.
    ///
    /// Invalid JWKs are logged and ignored without failing the whole set.
    /// A document without any usable key is an error.
    pub fn from_jwks(source: &str, jwks: &Value) -> VResult<Self> {
        let Some(keys) = jwks.get("keys") else {
            oidc_bail!(FetchFailure, "JSON key 'keys' not found in JWKS at {source}")
        };
        let Value::Array(keys) = keys else {
            oidc_bail!(FetchFailure, "JSON key 'keys' is not an array in JWKS at {source}")
        };

        let mut signing_keys: HashMap<String, Arc<SigningKey>> = HashMap::with_capacity(keys.len());
        for value in keys {
            let signing_key = serde_json::from_value::<Jwk>(value.clone())
                .map_err(|e| oidc_error!(ParseFailure, e))
                .and_then(|jwk| SigningKey::from_jwk(&jwk));
            match signing_key {
                Ok(signing_key) => {
                    if signing_keys.contains_key(signing_key.kid()) {
                        warn!(
                            "Ignoring JWK with duplicate key ID `{}` in JWKS at `{source}`",
                            signing_key.kid()
                        );
                        continue;
                    }
                    debug!("Found valid JWK in JWKS at `{source}`: {signing_key:?}");
                    signing_keys.insert(signing_key.kid().to_owned(), Arc::new(signing_key));
                }
                Err(e) => {
                    debug!("Ignoring invalid JWK in JWKS at `{source}`: {e}");
                }
            }
        }

        if signing_keys.is_empty() {
            oidc_bail!(FetchFailure, "No valid JWK found in JWKS at `{source}`")
        }

        Ok(Self {
            keys: signing_keys,
            fetched_at: Utc::now(),
            source: source.to_owned(),
        })
    }

    /// Find the key identified by `kid`
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The key IDs of the set, sorted
    #[must_use]
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    #[must_use]
    pub const fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use jsonwebtoken::Algorithm;
    use serde_json::{Value, json};

    use super::{KeyFamily, KeySet};
    use crate::error::VerificationError;

    const SOURCE: &str = "http://localhost/realms/community/protocol/openid-connect/certs";

    fn fixture_jwks() -> Value {
        serde_json::from_str(include_str!("../../test_data/jwks.json")).unwrap()
    }

    #[test]
    fn test_parse_keycloak_jwks_skips_encryption_keys() {
        let key_set = KeySet::from_jwks(SOURCE, &fixture_jwks()).unwrap();
        assert_eq!(key_set.kids(), vec!["ec-key-1", "key-1"]);
        assert_eq!(key_set.source(), SOURCE);
        assert!(key_set.find("enc-key").is_none());

        let rsa = key_set.find("key-1").unwrap();
        assert_eq!(rsa.algorithm(), Some(Algorithm::RS256));
        assert!(rsa.accepts(Algorithm::RS256));
        assert!(!rsa.accepts(Algorithm::RS384));
        assert!(!rsa.accepts(Algorithm::HS256));

        let ec = key_set.find("ec-key-1").unwrap();
        assert_eq!(ec.algorithm(), None);
        assert_eq!(ec.family(), KeyFamily::EcP256);
        assert!(ec.accepts(Algorithm::ES256));
        assert!(!ec.accepts(Algorithm::ES384));
        assert!(!ec.accepts(Algorithm::RS256));
    }

    #[test]
    fn test_invalid_and_duplicate_keys_are_ignored() {
        let mut jwks = fixture_jwks();
        let keys = jwks["keys"].as_array_mut().unwrap();
        let mut duplicate = keys[1].clone();
        duplicate["kid"] = json!("key-1");
        keys.push(duplicate);
        keys.push(json!({"kty": "RSA", "n": "AQAB", "e": "AQAB"}));
        keys.push(json!({"kid": "secret", "kty": "oct", "k": "c2VjcmV0"}));
        keys.push(json!({"kid": "bogus", "kty": "unknown"}));

        let key_set = KeySet::from_jwks(SOURCE, &jwks).unwrap();
        assert_eq!(key_set.len(), 2);
        // the first key published under an ID wins
        assert_eq!(key_set.find("key-1").unwrap().family(), KeyFamily::Rsa);
        assert!(key_set.find("secret").is_none());
    }

    #[test]
    fn test_mismatched_declared_algorithm_is_ignored() {
        let mut jwks = fixture_jwks();
        jwks["keys"][0]["alg"] = json!("ES256");
        let key_set = KeySet::from_jwks(SOURCE, &jwks).unwrap();
        assert!(key_set.find("key-1").is_none());
    }

    #[test]
    fn test_unusable_documents() {
        let err = KeySet::from_jwks(SOURCE, &json!({"foo": []})).unwrap_err();
        assert!(matches!(err, VerificationError::FetchFailure(_)));

        let err = KeySet::from_jwks(SOURCE, &json!({"keys": {}})).unwrap_err();
        assert!(matches!(err, VerificationError::FetchFailure(_)));

        let err = KeySet::from_jwks(SOURCE, &json!({"keys": []})).unwrap_err();
        assert_eq!(
            err,
            VerificationError::FetchFailure(format!("No valid JWK found in JWKS at `{SOURCE}`"))
        );
    }

    #[test]
    fn test_family_accepts() {
        assert!(KeyFamily::Rsa.accepts(Algorithm::PS512));
        assert!(!KeyFamily::Rsa.accepts(Algorithm::ES256));
        assert!(KeyFamily::EcP384.accepts(Algorithm::ES384));
        assert!(KeyFamily::Ed25519.accepts(Algorithm::EdDSA));
        assert!(!KeyFamily::Ed25519.accepts(Algorithm::HS512));
    }
}
