use std::collections::HashMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    error::VerificationError,
    result::{VResult, VResultHelper},
};

/// The outcome of a successful offline verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: bool,
    #[serde(rename = "tokenHeader")]
    pub header: Map<String, Value>,
    pub data: Map<String, Value>,
}

impl VerificationResult {
    pub(crate) const fn valid(header: Map<String, Value>, data: Map<String, Value>) -> Self {
        Self {
            status: true,
            header,
            data,
        }
    }

    /// A single claim of the token
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Deserialize the claims into `T`, e.g. `KeycloakClaims`
    pub fn claims_as<T: DeserializeOwned>(&self) -> VResult<T> {
        serde_json::from_value(Value::Object(self.data.clone()))
            .context(VerificationError::ParseFailure, "cannot decode the token claims")
    }
}

/// The `aud` claim: a single audience or a list of audiences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(aud) => aud == audience,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The claims found in Keycloak access tokens and introspection responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeycloakClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    #[serde(
        rename = "allowed-origins",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub allowed_origins: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<Roles>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub resource_access: HashMap<String, Roles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl KeycloakClaims {
    /// The realm roles granted to the subject
    #[must_use]
    pub fn realm_roles(&self) -> &[String] {
        self.realm_access
            .as_ref()
            .map(|access| access.roles.as_slice())
            .unwrap_or_default()
    }

    /// The roles granted to the subject on the `client` resource
    #[must_use]
    pub fn client_roles(&self, client: &str) -> &[String] {
        self.resource_access
            .get(client)
            .map(|access| access.roles.as_slice())
            .unwrap_or_default()
    }

    /// The space separated scopes, split
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or_default().split_whitespace()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};

    use super::{Audience, KeycloakClaims, VerificationResult};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_result_serialization_names() {
        let result = VerificationResult::valid(
            object(json!({"alg": "RS256", "kid": "key-1"})),
            object(json!({"sub": "alice"})),
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], true);
        assert_eq!(value["tokenHeader"]["kid"], "key-1");
        assert_eq!(value["data"]["sub"], "alice");
    }

    #[test]
    fn test_keycloak_claims() {
        let result = VerificationResult::valid(
            Map::new(),
            object(json!({
                "exp": 1_700_000_000,
                "iss": "http://localhost:8080/realms/community",
                "aud": ["account", "my-api"],
                "sub": "f4c1e2a0",
                "preferred_username": "alice",
                "allowed-origins": ["http://localhost:3000"],
                "realm_access": {"roles": ["offline_access", "user"]},
                "resource_access": {"account": {"roles": ["manage-account"]}},
                "scope": "openid email profile",
                "email_verified": true
            })),
        );
        let claims: KeycloakClaims = result.claims_as().unwrap();
        assert_eq!(claims.preferred_username.as_deref(), Some("alice"));
        assert!(claims.aud.as_ref().unwrap().contains("my-api"));
        assert_eq!(claims.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(claims.realm_roles(), ["offline_access", "user"]);
        assert_eq!(claims.client_roles("account"), ["manage-account"]);
        assert!(claims.client_roles("broker").is_empty());
        assert_eq!(claims.scopes().collect::<Vec<_>>(), ["openid", "email", "profile"]);

        let single: KeycloakClaims = serde_json::from_value(json!({"aud": "account"})).unwrap();
        assert_eq!(single.aud, Some(Audience::Single("account".to_owned())));
    }
}
