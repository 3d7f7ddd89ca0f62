//! Errors surfaced by the CLI.

use octolens::{ClientError, WebhookError};
use thiserror::Error;

/// Failure of one CLI run, printed to stderr before exiting non-zero.
#[derive(Debug, Error)]
pub enum CliError {
    /// A GitHub client operation failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A webhook delivery could not be applied.
    #[error(transparent)]
    Webhook(#[from] WebhookError),

    /// Configuration was missing or invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// What was wrong.
        message: String,
    },

    /// Reading input, writing output, or talking to the database failed.
    #[error("I/O error: {message}")]
    Io {
        /// Underlying failure.
        message: String,
    },
}
