//! Row shapes written by the webhook processor and the report commands.
//!
//! Identifiers named `platform_id`, `repository_id`, `pull_request_id`, and
//! `reviewer_id` are GitHub's own ids, not local row ids.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::github::models::{PullRequest, PullRequestState, Repository, ReviewState};

/// A repository row, keyed by `full_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    /// GitHub repository id.
    pub platform_id: u64,
    /// Repository name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Whether the repository is private.
    pub private: bool,
    /// Browser URL.
    pub url: String,
}

/// A pull request row, keyed by `(repository_id, number)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    /// GitHub pull request id.
    pub platform_id: u64,
    /// GitHub repository id.
    pub repository_id: u64,
    /// Number within the repository.
    pub number: u64,
    /// Title.
    pub title: String,
    /// Lifecycle status.
    pub status: PullRequestState,
    /// Whether the pull request is a draft.
    pub draft: bool,
    /// `!draft`.
    pub is_ready: bool,
    /// Target branch.
    pub base_branch: String,
    /// Source branch.
    pub head_branch: String,
    /// GitHub id of the author.
    pub author_id: Option<u64>,
    /// Free-form metadata, such as merge details.
    pub metadata: Option<Value>,
}

impl RepositoryRecord {
    /// Row for a repository fetched from the API.
    #[must_use]
    pub fn from_repository(repository: &Repository) -> Self {
        Self {
            platform_id: repository.id,
            name: repository.name.clone(),
            full_name: repository.full_name.clone(),
            private: repository.private,
            url: repository.html_url.clone().unwrap_or_default(),
        }
    }
}

impl PullRequestRecord {
    /// Row for a pull request fetched from the API.
    ///
    /// The API exposes the author's login but not their id, so `author_id`
    /// is left for webhook deliveries to fill.
    #[must_use]
    pub fn from_pull_request(repository_id: u64, pull_request: &PullRequest) -> Self {
        let metadata = json!({
            "mergeableState": pull_request.mergeable_state,
            "mergedAt": pull_request.merged_at,
            "labels": pull_request.labels,
        });
        Self {
            platform_id: pull_request.id,
            repository_id,
            number: pull_request.number,
            title: pull_request.title.clone(),
            status: pull_request.state,
            draft: pull_request.draft,
            is_ready: !pull_request.draft,
            base_branch: pull_request.base_branch.clone(),
            head_branch: pull_request.head_branch.clone(),
            author_id: None,
            metadata: Some(metadata),
        }
    }
}

/// Partial update of a pull request row; `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestUpdate {
    /// New title.
    pub title: Option<String>,
    /// New status.
    pub status: Option<PullRequestState>,
    /// New draft flag.
    pub draft: Option<bool>,
    /// New readiness flag.
    pub is_ready: Option<bool>,
    /// Replacement metadata.
    pub metadata: Option<Value>,
}

/// A review row, keyed by `platform_id` and grouped by
/// `(pull_request_id, reviewer_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    /// GitHub review id.
    pub platform_id: u64,
    /// GitHub pull request id.
    pub pull_request_id: u64,
    /// GitHub user id of the reviewer.
    pub reviewer_id: u64,
    /// Login of the reviewer.
    pub reviewer_login: String,
    /// Review state.
    pub state: ReviewState,
    /// Review text.
    pub body: String,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
}

/// Selects the reviews a bulk update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewFilter {
    /// GitHub pull request id.
    pub pull_request_id: u64,
    /// GitHub user id of the reviewer.
    pub reviewer_id: u64,
    /// Skip rows already in this state.
    pub exclude_state: Option<ReviewState>,
}

/// Result of an insert that tolerates redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new row was inserted.
    Created,
    /// A row with the same key already existed; nothing changed.
    AlreadyExists,
}
