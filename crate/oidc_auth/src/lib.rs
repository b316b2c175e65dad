//! Verification of the bearer access tokens issued by a Keycloak style OpenID Connect provider.
//!
//! - offline, against the JWKS of the provider, cached and refreshed in the background;
//! - online, through the token introspection endpoint of the provider.

pub mod config;
pub mod error;
mod introspection;
pub mod jwks;
pub mod jwt;
pub mod result;
mod verifier;

pub use error::VerificationError;
pub use introspection::IntrospectionResult;
pub use jwt::{KeycloakClaims, VerificationResult};
pub use result::VResult;
pub use verifier::{OidcVerifier, TokenVerifier, introspect_uri, jwks_uri};

#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn
)]
