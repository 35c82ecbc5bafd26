//! Error types for the `qq-connect` crate.
//!
//! A root Error struct holds an error kind tree plus an optional source for
//! error chaining. Every failure the provider or the state codec can produce
//! maps to a distinct kind, so callers can tell an expired state apart from a
//! tampered one or from a provider-side rejection.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the qq-connect crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in qq-connect.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    State(StateErrorKind),
    OAuth(OAuthErrorKind),
    Http(HttpErrorKind),
}

/// Errors from state-token validation.
#[derive(Debug, PartialEq)]
pub enum StateErrorKind {
    /// Not base64, not UTF-8, or decoded length is not 45 characters.
    Malformed,
    /// Recomputed digest checksum does not match the embedded one.
    ChecksumMismatch,
    /// Embedded timestamp is older than the allowed window.
    Expired,
}

/// Errors from the remote OAuth endpoints.
#[derive(Debug, PartialEq)]
pub enum OAuthErrorKind {
    /// The provider returned an error code or description.
    ProviderError,
    /// Empty body, unparsable JSON, or required fields missing.
    MalformedResponse,
}

/// Errors from HTTP client operations.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Network,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::State(kind) => write!(f, "state token error: {:?}", kind),
            ErrorKind::OAuth(kind) => write!(f, "OAuth error: {:?}", kind),
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

/// Helper function to create state-token errors.
pub fn state_error(kind: StateErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::State(kind),
    }
}

/// Helper function to create OAuth errors.
pub fn oauth_error(kind: OAuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::OAuth(kind),
    }
}
