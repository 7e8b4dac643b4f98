//! Backend error taxonomy.
//!
//! Every failure reported by a [`DocumentStore`](crate::store::DocumentStore)
//! is a [`StoreError`] carrying the backend's string code. [`classify`] maps
//! it onto a fixed set of [`ErrorKind`]s, each with a message that is safe to
//! show to a user verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Raw error surfaced by a document store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    /// Backend error code, e.g. `"unavailable"` or `"permission-denied"`.
    pub code: Option<String>,
    /// Diagnostic text. Never shown to users.
    pub message: String,
}

impl StoreError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// An error without a backend code.
    pub fn uncoded(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable.code(), message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.code
            .as_deref()
            .map(ErrorKind::from_code)
            .unwrap_or(ErrorKind::Unknown)
    }
}

/// Failure categories a backend error can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Unavailable,
    FailedPrecondition,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    ResourceExhausted,
    Cancelled,
    DataLoss,
    Unauthenticated,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::Unavailable,
        ErrorKind::FailedPrecondition,
        ErrorKind::PermissionDenied,
        ErrorKind::NotFound,
        ErrorKind::AlreadyExists,
        ErrorKind::ResourceExhausted,
        ErrorKind::Cancelled,
        ErrorKind::DataLoss,
        ErrorKind::Unauthenticated,
        ErrorKind::Unknown,
    ];

    /// Exact-match lookup of a backend code. Anything unmapped is `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "unavailable" => ErrorKind::Unavailable,
            "failed-precondition" => ErrorKind::FailedPrecondition,
            "permission-denied" => ErrorKind::PermissionDenied,
            "not-found" => ErrorKind::NotFound,
            "already-exists" => ErrorKind::AlreadyExists,
            "resource-exhausted" => ErrorKind::ResourceExhausted,
            "cancelled" => ErrorKind::Cancelled,
            "data-loss" => ErrorKind::DataLoss,
            "unauthenticated" => ErrorKind::Unauthenticated,
            _ => ErrorKind::Unknown,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::FailedPrecondition => "failed-precondition",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::NotFound => "not-found",
            ErrorKind::AlreadyExists => "already-exists",
            ErrorKind::ResourceExhausted => "resource-exhausted",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::DataLoss => "data-loss",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// User-facing message for this kind.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Unavailable => {
                "Network connection lost. The app will continue working offline \
                 and sync when connection is restored."
            }
            ErrorKind::FailedPrecondition => {
                "Operation failed. Please refresh the page and try again."
            }
            ErrorKind::PermissionDenied => "You do not have permission to perform this action.",
            ErrorKind::NotFound => "The requested resource was not found.",
            ErrorKind::AlreadyExists => "This record already exists.",
            ErrorKind::ResourceExhausted => "Too many requests. Please try again later.",
            ErrorKind::Cancelled => "Operation was cancelled. Please try again.",
            ErrorKind::DataLoss => "Critical error: Data loss occurred. Please contact support.",
            ErrorKind::Unauthenticated => "Please sign in to continue.",
            ErrorKind::Unknown => "An unexpected error occurred. Please try again.",
        }
    }

    /// Whether the failure is transient.
    ///
    /// `ResourceExhausted` is transient but only worth retrying after a
    /// backoff the caller chooses to pay for.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Unavailable | ErrorKind::Cancelled | ErrorKind::ResourceExhausted
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A classified failure: the kind plus the message to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorRecord {
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.message().to_string(),
        }
    }
}

impl From<ErrorKind> for ErrorRecord {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

/// Maps a raw backend error onto the taxonomy. Never fails.
pub fn classify(error: &StoreError) -> ErrorRecord {
    let kind = error.kind();
    match kind {
        ErrorKind::Unknown => tracing::warn!(
            code = error.code.as_deref().unwrap_or("<none>"),
            "Unclassified backend error: {}",
            error.message
        ),
        _ => tracing::debug!(code = kind.code(), "Backend error: {}", error.message),
    }
    ErrorRecord::from_kind(kind)
}
