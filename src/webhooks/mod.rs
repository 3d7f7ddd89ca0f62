//! Webhook-driven persistence updates.
//!
//! [`WebhookProcessor`] turns `pull_request`, `pull_request_review`, and
//! `repository` deliveries into single-statement writes against a
//! [`crate::persistence::Store`]. Unrecognised `(event, action)` pairs are
//! ignored rather than rejected so new GitHub actions never break delivery.

mod error;
mod payload;
mod processor;

pub use error::WebhookError;
pub use processor::{WebhookOutcome, WebhookProcessor};
