mod claims;
mod header;
pub mod selector;
mod validator;

pub use claims::{Audience, KeycloakClaims, Roles, VerificationResult};
pub use header::UnverifiedHeader;
pub use validator::TokenValidator;
