//! Error types for companynotes.
//!
//! This module defines all error types used throughout the companynotes crate.
//! The first group of variants is the note store's outcome taxonomy, which the
//! HTTP layer matches on to pick a status code; the rest are infrastructure
//! failures that surface to callers as a generic failure.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for companynotes operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Store Outcomes ===
    /// A capability needs a backend or provider that is not configured.
    #[error("{what} is not configured")]
    NotConfigured {
        /// The missing capability.
        what: &'static str,
    },

    /// No record exists with the given identifier.
    #[error("{what} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        what: &'static str,
        /// The identifier that did not match.
        id: String,
    },

    /// The requester does not own the record it tried to change.
    #[error("not authorized to {action} this note")]
    NotAuthorized {
        /// The attempted action, e.g. `edit` or `delete`.
        action: &'static str,
    },

    /// A mutating operation was attempted without a requester identity.
    #[error("authentication required")]
    AuthenticationRequired,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a data file.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path that couldn't be read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a data file.
    #[error("failed to write {path}: {source}")]
    FileWrite {
        /// Path that couldn't be written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The server could not bind its listening address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// The address that was requested.
        address: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML rendering failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// A data file does not hold the expected JSON document.
    #[error("malformed data file {path}: {source}")]
    MalformedFile {
        /// Path of the offending file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    // === Hosted Backend Errors ===
    /// The HTTP request to a remote service failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The hosted document service answered with a failure status.
    #[error("hosted backend returned {status}: {message}")]
    Hosted {
        /// HTTP status code.
        status: u16,
        /// Error text from the response body.
        message: String,
    },

    /// A stored document could not be decoded into a record.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    // === Identity Errors ===
    /// A bearer token failed verification.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token verification key could not be loaded.
    #[error("failed to load verification key from {path}: {message}")]
    KeyLoad {
        /// Path to the key file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Summary Errors ===
    /// The completion provider failed to produce a summary.
    #[error("summary generation failed: {0}")]
    Summary(String),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for companynotes operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidToken(err.to_string())
    }
}

impl Error {
    /// Create a not-configured error.
    #[must_use]
    pub fn not_configured(what: &'static str) -> Self {
        Self::NotConfigured { what }
    }

    /// Create a not-found error for a note.
    #[must_use]
    pub fn note_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            what: "note",
            id: id.into(),
        }
    }

    /// Create a not-found error for a company.
    #[must_use]
    pub fn company_not_found(id: i64) -> Self {
        Self::NotFound {
            what: "company",
            id: id.to_string(),
        }
    }

    /// Create a not-authorized error for the given action.
    #[must_use]
    pub fn not_authorized(action: &'static str) -> Self {
        Self::NotAuthorized { action }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new summary error.
    #[must_use]
    pub fn summary(message: impl Into<String>) -> Self {
        Self::Summary(message.into())
    }

    /// Check if this error means a record was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is an ownership failure.
    #[must_use]
    pub fn is_not_authorized(&self) -> bool {
        matches!(self, Self::NotAuthorized { .. })
    }

    /// Check if this error is a missing requester identity.
    #[must_use]
    pub fn is_authentication_required(&self) -> bool {
        matches!(self, Self::AuthenticationRequired)
    }

    /// Check if this error is a missing backend or provider.
    #[must_use]
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured { .. })
    }
}
