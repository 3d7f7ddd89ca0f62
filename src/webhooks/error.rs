//! Errors raised while applying a webhook delivery.

use thiserror::Error;

use crate::persistence::PersistenceError;

/// Failure to apply a recognised webhook delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// The payload lacked a field the action requires.
    #[error("malformed {event} payload: {message}")]
    MalformedPayload {
        /// Webhook event name.
        event: String,
        /// Deserialisation detail.
        message: String,
    },

    /// The store rejected the write.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
