use std::fmt::Display;

use crate::error::VerificationError;

pub type VResult<R> = Result<R, VerificationError>;

/// Constructor of a `VerificationError` variant, e.g. `VerificationError::FetchFailure`
pub type ErrorKind = fn(String) -> VerificationError;

/// A helper trait for `VResult` that provides additional methods for error handling.
pub trait VResultHelper<T> {
    /// Converts the error into the `kind` variant, prefixed by `context`.
    ///
    /// # Errors
    ///
    /// Returns a `VResult` with the specified variant if the original result is an error.
    fn context(self, kind: ErrorKind, context: &str) -> VResult<T>;

    /// Converts the error into the `kind` variant, prefixed by the context returned by `op`.
    ///
    /// # Errors
    ///
    /// Returns a `VResult` with the specified variant if the original result is an error.
    fn with_context<O>(self, kind: ErrorKind, op: O) -> VResult<T>
    where
        O: FnOnce() -> String;
}

impl<T, E> VResultHelper<T> for Result<T, E>
where
    E: Display,
{
    fn context(self, kind: ErrorKind, context: &str) -> VResult<T> {
        self.map_err(|e| kind(format!("{context}: {e}")))
    }

    fn with_context<O>(self, kind: ErrorKind, op: O) -> VResult<T>
    where
        O: FnOnce() -> String,
    {
        self.map_err(|e| kind(format!("{}: {e}", op())))
    }
}

impl<T> VResultHelper<T> for Option<T> {
    fn context(self, kind: ErrorKind, context: &str) -> VResult<T> {
        self.ok_or_else(|| kind(context.to_owned()))
    }

    fn with_context<O>(self, kind: ErrorKind, op: O) -> VResult<T>
    where
        O: FnOnce() -> String,
    {
        self.ok_or_else(|| kind(op()))
    }
}
