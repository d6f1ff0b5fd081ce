//! Transport errors and their classification.
//!
//! Client implementations report raw `TransportError`s. The engine never
//! inspects those directly: every failure is run through [`classify`] into a
//! `ClassifiedError` carrying a small kind taxonomy and a retryable flag.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Raw failure reported by a pipeline client implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        /// Value of the remaining-rate header, when the response carried one.
        rate_limit_remaining: Option<u64>,
        /// Server-provided retry hint (`Retry-After`).
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (connect, DNS, timeout).
    #[error("network error: {message}")]
    Network { message: String },

    /// A response arrived but could not be decoded.
    #[error("decode error: {message}")]
    Decode { message: String },
}

impl TransportError {
    /// Shorthand for an HTTP failure without rate-limit metadata.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            rate_limit_remaining: None,
            retry_after: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error taxonomy surfaced to the user and consumed by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Auth,
    RateLimit,
    NotFound,
    Server,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::NotFound => "not_found",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport failure mapped into the engine's taxonomy.
///
/// `Display` is the user-facing message; the original transport error is
/// available as `cause` and through `Error::source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub cause: Option<TransportError>,
    pub retryable: bool,
    pub retry_after: Option<Duration>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            retryable,
            retry_after: None,
        }
    }

    fn from_cause(kind: ErrorKind, message: &str, retryable: bool, cause: &TransportError) -> Self {
        Self {
            kind,
            message: message.to_string(),
            cause: Some(cause.clone()),
            retryable,
            retry_after: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for ClassifiedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl From<TransportError> for ClassifiedError {
    fn from(err: TransportError) -> Self {
        classify_transport(&err)
    }
}

/// Map a transport failure into the taxonomy. `None` yields `None`.
pub fn classify(err: Option<&TransportError>) -> Option<ClassifiedError> {
    err.map(classify_transport)
}

fn classify_transport(err: &TransportError) -> ClassifiedError {
    match err {
        TransportError::Http {
            status,
            rate_limit_remaining,
            retry_after,
            ..
        } => match *status {
            401 => ClassifiedError::from_cause(ErrorKind::Auth, "Authentication failed", false, err),
            403 if *rate_limit_remaining == Some(0) => ClassifiedError {
                retry_after: *retry_after,
                ..ClassifiedError::from_cause(ErrorKind::RateLimit, "Rate limit exceeded", true, err)
            },
            403 => ClassifiedError::from_cause(ErrorKind::Auth, "Access denied", false, err),
            404 => ClassifiedError::from_cause(ErrorKind::NotFound, "Resource not found", false, err),
            429 => ClassifiedError {
                retry_after: *retry_after,
                ..ClassifiedError::from_cause(ErrorKind::RateLimit, "Too many requests", true, err)
            },
            500..=599 => ClassifiedError::from_cause(ErrorKind::Server, "Server error", true, err),
            _ => ClassifiedError::from_cause(ErrorKind::Unknown, "Unexpected error", false, err),
        },
        TransportError::Network { .. } => {
            ClassifiedError::from_cause(ErrorKind::Network, "Network unavailable", true, err)
        }
        TransportError::Decode { .. } => {
            ClassifiedError::from_cause(ErrorKind::Unknown, "Unexpected error", false, err)
        }
    }
}

/// Whether `err`, or any error in its source chain, is a retryable
/// `ClassifiedError`. Unclassified errors are never retryable.
pub fn is_retryable(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(classified) = e.downcast_ref::<ClassifiedError>() {
            return classified.retryable;
        }
        current = e.source();
    }
    false
}
