use thiserror::Error;

// Any non-`Ok` result means: do not trust this token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    // The access token is missing or empty
    #[error("Empty input: {0}")]
    EmptyInput(String),

    // The base URL, realm or client credentials are missing or unusable
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    // Network failure or timeout reaching the JWKS or introspection endpoint
    #[error("Fetch failure: {0}")]
    FetchFailure(String),

    // Not a JWT, or an undecodable response
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    // Well-formed token, bad signature
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    // Valid signature, failed claim check (expiry, issuer, audience...)
    #[error("Invalid claim: {0}")]
    ClaimInvalid(String),

    // No key in the key set matches the token header
    #[error("Key selection failure: {0}")]
    SelectionFailure(String),
}

impl VerificationError {
    /// The human-readable message carried by the error, without its category prefix
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::EmptyInput(m)
            | Self::MissingConfig(m)
            | Self::FetchFailure(m)
            | Self::ParseFailure(m)
            | Self::SignatureInvalid(m)
            | Self::ClaimInvalid(m)
            | Self::SelectionFailure(m) => m,
        }
    }

    /// Key selection failures surface as parse failures outside the key selector
    #[must_use]
    pub(crate) fn selection_as_parse_failure(self) -> Self {
        match self {
            Self::SelectionFailure(m) => Self::ParseFailure(m),
            e => e,
        }
    }
}

impl From<reqwest::Error> for VerificationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::FetchFailure(format!("request timed out: {e}"))
        } else {
            Self::FetchFailure(e.to_string())
        }
    }
}

impl From<url::ParseError> for VerificationError {
    fn from(e: url::ParseError) -> Self {
        Self::MissingConfig(format!("invalid URL: {e}"))
    }
}

impl From<serde_json::Error> for VerificationError {
    fn from(e: serde_json::Error) -> Self {
        Self::ParseFailure(e.to_string())
    }
}

impl From<base64::DecodeError> for VerificationError {
    fn from(e: base64::DecodeError) -> Self {
        Self::ParseFailure(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                Self::SignatureInvalid(e.to_string())
            }
            ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => Self::ClaimInvalid(e.to_string()),
            ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidKeyFormat => Self::SelectionFailure(e.to_string()),
            _ => Self::ParseFailure(e.to_string()),
        }
    }
}

/// Construct a `VerificationError` of the given variant from a format string.
#[macro_export]
macro_rules! oidc_error {
    ($variant:ident, $msg:literal $(,)?) => {
        $crate::error::VerificationError::$variant(::core::format_args!($msg).to_string())
    };
    ($variant:ident, $err:expr $(,)?) => {
        $crate::error::VerificationError::$variant($err.to_string())
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::error::VerificationError::$variant(::core::format_args!($fmt, $($arg)*).to_string())
    };
}

/// Return early with an error of the given variant.
#[macro_export]
macro_rules! oidc_bail {
    ($variant:ident, $msg:literal $(,)?) => {
        return ::core::result::Result::Err($crate::oidc_error!($variant, $msg))
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        return ::core::result::Result::Err($crate::oidc_error!($variant, $fmt, $($arg)*))
    };
    ($err:expr $(,)?) => {
        return ::core::result::Result::Err($err)
    };
}

/// Return early with an error if a condition is not satisfied.
///
/// This macro is equivalent to `if !$cond { return Err(From::from($err)); }`.
#[macro_export]
macro_rules! oidc_ensure {
    ($cond:expr, $variant:ident, $msg:literal $(,)?) => {
        if !$cond {
            return ::core::result::Result::Err($crate::oidc_error!($variant, $msg));
        }
    };
    ($cond:expr, $variant:ident, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return ::core::result::Result::Err($crate::oidc_error!($variant, $fmt, $($arg)*));
        }
    };
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return ::core::result::Result::Err($err);
        }
    };
}
