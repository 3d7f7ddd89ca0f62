//! Applies webhook deliveries to the store.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::error::WebhookError;
use super::payload::{RawPullRequestPayload, RawRepositoryPayload, RawReviewPayload};
use crate::github::models::{PullRequestState, ReviewState};
use crate::persistence::{PullRequestUpdate, ReviewFilter, ReviewRecord, Store, WriteOutcome};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

const PULL_REQUEST_EVENT: &str = "pull_request";
const REVIEW_EVENT: &str = "pull_request_review";
const REPOSITORY_EVENT: &str = "repository";

/// What a delivery did to persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The delivery was written.
    Applied,
    /// The delivery repeated an earlier create and changed nothing.
    Duplicate,
    /// The `(event, action)` pair is not handled.
    Ignored,
}

/// Maps webhook deliveries onto [`Store`] writes.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use octolens::persistence::SqliteStore;
/// use octolens::telemetry::NoopTelemetrySink;
/// use octolens::webhooks::{WebhookOutcome, WebhookProcessor};
///
/// let store = SqliteStore::open(":memory:").expect("database should open");
/// store.migrate(&NoopTelemetrySink).expect("migrations should run");
/// let processor = WebhookProcessor::new(Arc::new(store), Arc::new(NoopTelemetrySink));
///
/// let outcome = processor
///     .handle("issues", &serde_json::json!({ "action": "opened" }))
///     .expect("unknown events are ignored");
/// assert_eq!(outcome, WebhookOutcome::Ignored);
/// ```
pub struct WebhookProcessor {
    store: Arc<dyn Store>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl fmt::Debug for WebhookProcessor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WebhookProcessor")
            .finish_non_exhaustive()
    }
}

impl WebhookProcessor {
    /// Creates a processor writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self { store, telemetry }
    }

    /// Applies one delivery.
    ///
    /// `event` is the `X-GitHub-Event` header value and `payload` the parsed
    /// JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::MalformedPayload`] when a recognised delivery
    /// lacks required fields, or [`WebhookError::Persistence`] when the write
    /// fails.
    pub fn handle(&self, event: &str, payload: &Value) -> Result<WebhookOutcome, WebhookError> {
        let action = payload
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let outcome = match (event, action) {
            (PULL_REQUEST_EVENT, "opened") => self.pull_request_opened(payload)?,
            (PULL_REQUEST_EVENT, "closed") => self.pull_request_closed(payload)?,
            (
                PULL_REQUEST_EVENT,
                "reopened" | "edited" | "synchronize" | "ready_for_review" | "converted_to_draft",
            ) => self.pull_request_changed(payload)?,
            (REVIEW_EVENT, "submitted") => self.review_submitted(payload)?,
            (REVIEW_EVENT, "dismissed") => self.review_dismissed(payload)?,
            (REPOSITORY_EVENT, "created") => self.repository_created(payload)?,
            (REPOSITORY_EVENT, "deleted") => self.repository_deleted(payload)?,
            (REPOSITORY_EVENT, "privatized") => self.repository_visibility(payload, true)?,
            (REPOSITORY_EVENT, "publicized") => self.repository_visibility(payload, false)?,
            _ => {
                debug!(event, action, "ignoring webhook delivery");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        match outcome {
            WebhookOutcome::Applied => {
                info!(event, action, "webhook applied");
                self.telemetry.record(TelemetryEvent::WebhookApplied {
                    event: event.to_owned(),
                    action: action.to_owned(),
                });
            }
            WebhookOutcome::Duplicate => debug!(event, action, "webhook redelivery ignored"),
            WebhookOutcome::Ignored => {}
        }
        Ok(outcome)
    }

    fn pull_request_opened(&self, payload: &Value) -> Result<WebhookOutcome, WebhookError> {
        let raw: RawPullRequestPayload = parse(PULL_REQUEST_EVENT, payload)?;
        let record = raw
            .pull_request
            .to_record(raw.repository.id, PullRequestState::Open);
        self.store.upsert_pull_request(&record)?;
        Ok(WebhookOutcome::Applied)
    }

    fn pull_request_closed(&self, payload: &Value) -> Result<WebhookOutcome, WebhookError> {
        let raw: RawPullRequestPayload = parse(PULL_REQUEST_EVENT, payload)?;
        let pull_request = &raw.pull_request;
        let update = if pull_request.is_merged() {
            PullRequestUpdate {
                status: Some(PullRequestState::Merged),
                metadata: Some(json!({
                    "mergedAt": pull_request.merged_at,
                    "merged": true,
                })),
                ..PullRequestUpdate::default()
            }
        } else {
            PullRequestUpdate {
                status: Some(PullRequestState::Closed),
                ..PullRequestUpdate::default()
            }
        };
        self.update_or_upsert(&raw, update)
    }

    fn pull_request_changed(&self, payload: &Value) -> Result<WebhookOutcome, WebhookError> {
        let raw: RawPullRequestPayload = parse(PULL_REQUEST_EVENT, payload)?;
        let pull_request = &raw.pull_request;
        let update = PullRequestUpdate {
            title: Some(pull_request.title.clone()),
            status: Some(pull_request.status()),
            draft: Some(pull_request.draft),
            is_ready: Some(!pull_request.draft),
            metadata: None,
        };
        self.update_or_upsert(&raw, update)
    }

    /// Applies `update`, inserting the full record when no row matched so a
    /// delivery that overtakes `opened` is not lost.
    fn update_or_upsert(
        &self,
        raw: &RawPullRequestPayload,
        update: PullRequestUpdate,
    ) -> Result<WebhookOutcome, WebhookError> {
        let repository_id = raw.repository.id;
        let number = raw.pull_request.number;
        let changed = self
            .store
            .update_pull_request(repository_id, number, &update)?;
        if changed > 0 {
            return Ok(WebhookOutcome::Applied);
        }

        debug!(repository_id, number, "pull request not stored yet; upserting");
        let status = update.status.unwrap_or_else(|| raw.pull_request.status());
        let mut record = raw.pull_request.to_record(repository_id, status);
        record.metadata = update.metadata;
        self.store.upsert_pull_request(&record)?;
        Ok(WebhookOutcome::Applied)
    }

    fn review_submitted(&self, payload: &Value) -> Result<WebhookOutcome, WebhookError> {
        let raw: RawReviewPayload = parse(REVIEW_EVENT, payload)?;
        let review = raw.review;
        let record = ReviewRecord {
            platform_id: review.id,
            pull_request_id: raw.pull_request.id,
            reviewer_id: review.user.id,
            reviewer_login: review.user.login,
            state: ReviewState::parse(&review.state),
            body: review.body.unwrap_or_default(),
            submitted_at: review.submitted_at.unwrap_or_else(Utc::now),
        };
        Ok(created_outcome(self.store.create_review(&record)?))
    }

    fn review_dismissed(&self, payload: &Value) -> Result<WebhookOutcome, WebhookError> {
        let raw: RawReviewPayload = parse(REVIEW_EVENT, payload)?;
        let filter = ReviewFilter {
            pull_request_id: raw.pull_request.id,
            reviewer_id: raw.review.user.id,
            exclude_state: Some(ReviewState::Dismissed),
        };
        let changed = self
            .store
            .update_many_reviews(&filter, ReviewState::Dismissed)?;
        debug!(
            pull_request_id = filter.pull_request_id,
            reviewer_id = filter.reviewer_id,
            changed,
            "reviews dismissed"
        );
        Ok(WebhookOutcome::Applied)
    }

    fn repository_created(&self, payload: &Value) -> Result<WebhookOutcome, WebhookError> {
        let raw: RawRepositoryPayload = parse(REPOSITORY_EVENT, payload)?;
        let outcome = self.store.create_repository(&raw.repository.to_record())?;
        Ok(created_outcome(outcome))
    }

    fn repository_deleted(&self, payload: &Value) -> Result<WebhookOutcome, WebhookError> {
        let raw: RawRepositoryPayload = parse(REPOSITORY_EVENT, payload)?;
        self.store.delete_repository(&raw.repository.full_name)?;
        Ok(WebhookOutcome::Applied)
    }

    fn repository_visibility(
        &self,
        payload: &Value,
        private: bool,
    ) -> Result<WebhookOutcome, WebhookError> {
        let raw: RawRepositoryPayload = parse(REPOSITORY_EVENT, payload)?;
        self.store
            .update_repository_visibility(&raw.repository.full_name, private)?;
        Ok(WebhookOutcome::Applied)
    }
}

fn parse<T: DeserializeOwned>(event: &str, payload: &Value) -> Result<T, WebhookError> {
    T::deserialize(payload).map_err(|error| WebhookError::MalformedPayload {
        event: event.to_owned(),
        message: error.to_string(),
    })
}

const fn created_outcome(outcome: WriteOutcome) -> WebhookOutcome {
    match outcome {
        WriteOutcome::Created => WebhookOutcome::Applied,
        WriteOutcome::AlreadyExists => WebhookOutcome::Duplicate,
    }
}
