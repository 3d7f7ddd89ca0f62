//! Error types exposed by the GitHub client layer.
//!
//! Every upstream failure is reduced to an [`ApiError`] carrying one
//! [`ErrorKind`]. Callers match on the kind rather than on the transport that
//! produced the failure. [`ClientError`] wraps the semantic error alongside
//! failures that are not GitHub's fault, such as malformed review payloads or
//! an unclean shutdown.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use super::fault::Fault;

/// Semantic classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The requested resource does not exist (HTTP 404).
    NotFound,
    /// The token was missing or rejected (HTTP 401).
    Authentication,
    /// The request quota is exhausted.
    RateLimit,
    /// The request never produced a response.
    Network,
    /// GitHub failed to serve the request (HTTP 5xx).
    Server,
    /// The request was rejected as malformed (HTTP 400 or 422).
    Validation,
    /// The request conflicts with the current resource state (HTTP 409).
    ResourceConflict,
    /// Any other response status.
    Unknown,
}

impl ErrorKind {
    /// Returns true when a later attempt may succeed without intervention.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Server)
    }

    /// Stable snake-case label used in logs and telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Authentication => "authentication",
            Self::RateLimit => "rate_limit",
            Self::Network => "network",
            Self::Server => "server",
            Self::Validation => "validation",
            Self::ResourceConflict => "resource_conflict",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Diagnostic context attached to every [`ApiError`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// When the failure was classified.
    pub timestamp: DateTime<Utc>,
    /// API path that was requested, when known.
    pub endpoint: Option<String>,
    /// HTTP method that was used, when known.
    pub method: Option<String>,
    /// Value of the `x-github-request-id` response header.
    pub request_id: Option<String>,
    /// Rate limit headers copied verbatim from a rate limited response.
    pub rate_limit: BTreeMap<String, String>,
    /// Field-level errors reported with a validation failure.
    pub field_errors: Vec<Value>,
    /// Response body preserved for statuses without a dedicated kind.
    pub response_body: Option<Value>,
}

/// A classified GitHub failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("GitHub {kind} error: {message}")]
pub struct ApiError {
    /// Semantic classification.
    pub kind: ErrorKind,
    /// Human readable detail.
    pub message: String,
    /// HTTP status; `Some(0)` for network failures and `None` when no
    /// response was received.
    pub status: Option<u16>,
    /// The fault the error was classified from.
    pub fault: Box<Fault>,
    /// Diagnostic context.
    pub context: Box<ErrorContext>,
}

impl ApiError {
    /// Returns true when the retry engine should attempt the call again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Errors surfaced by [`crate::github::GitHubClient`] and its helpers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// GitHub rejected the request or could not be reached.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// GitHub returned a payload that violates the expected data contract.
    #[error("data integrity violation: {message}")]
    DataIntegrity {
        /// Description of the violated contract.
        message: String,
    },

    /// Releasing client resources failed.
    #[error("failed to destroy service: {message}")]
    Destroy {
        /// Detail from the underlying disconnect failure.
        message: String,
    },

    /// The API base URL could not be parsed.
    #[error("GitHub API URL is invalid: {0}")]
    InvalidUrl(String),

    /// A required identifier was empty or malformed.
    #[error("invalid identifier: {message}")]
    InvalidIdentifier {
        /// Which identifier was rejected and why.
        message: String,
    },

    /// The authentication token was missing.
    #[error("personal access token is required")]
    MissingToken,

    /// Configuration could not be loaded or was incomplete.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the configuration failure.
        message: String,
    },
}

impl ClientError {
    /// Returns the semantic kind when this wraps an [`ApiError`].
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api(error) => Some(error.kind),
            _ => None,
        }
    }
}
