use cosmian_oidc_auth::VerificationError;
use thiserror::Error;

pub mod result;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    // The token did not verify, or could not be verified
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

/// Return early with an error if a condition is not satisfied.
#[macro_export]
macro_rules! cli_ensure {
    ($cond:expr, $msg:literal $(,)?) => {
        if !$cond {
            return ::core::result::Result::Err($crate::error::CliError::Configuration(::core::format_args!($msg).to_string()));
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return ::core::result::Result::Err($crate::error::CliError::Configuration(::core::format_args!($fmt, $($arg)*).to_string()));
        }
    };
}
