//! Error types for the expense-sheet crate.
//!
//! Internally the crate uses `anyhow` (`Res<T>`) and adds context as errors travel upward. At the
//! edges of each component the error is classified with an `ErrorType` so that callers, such as
//! the console loop, can decide whether an error is fatal or can be reported and skipped.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The internal result type, used wherever the kind of failure does not matter yet.
pub(crate) type Res<T> = std::result::Result<T, anyhow::Error>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies an `Error` by the collaborator or stage that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Required configuration is missing, a placeholder, or malformed.
    Config,
    /// OAuth credentials could not be acquired, loaded or refreshed.
    Auth,
    /// The completion service call failed (network, auth, quota).
    Upstream,
    /// The completion response could not be cleaned and decoded into expense records.
    Parse,
    /// A spreadsheet read or write failed.
    RemoteStore,
    /// Local file or console I/O failed.
    Io,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

impl ErrorType {
    /// Errors of these types affect a single input line and do not stop the console loop.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorType::Upstream | ErrorType::Parse | ErrorType::RemoteStore
        )
    }
}

/// The public error type. It carries an `ErrorType` and the underlying `anyhow::Error` chain.
pub struct Error {
    error_type: ErrorType,
    source: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            source: source.into(),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // The alternate form prints the whole context chain on one line.
        write!(f, "{:#}", self.source)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

/// Converts an internal result into the public `Result` by tagging its error with an `ErrorType`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}
