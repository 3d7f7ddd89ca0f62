//! Raw webhook payload shapes.
//!
//! Only the fields the processor writes are modelled; unknown fields are
//! ignored. Fields GitHub omits on some actions are optional.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::github::models::PullRequestState;
use crate::persistence::{PullRequestRecord, RepositoryRecord};

#[derive(Debug, Deserialize)]
pub(crate) struct RawUser {
    pub(crate) id: u64,
    pub(crate) login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRepository {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) full_name: String,
    #[serde(default)]
    pub(crate) private: bool,
    pub(crate) html_url: String,
}

impl RawRepository {
    pub(crate) fn to_record(&self) -> RepositoryRecord {
        RepositoryRecord {
            platform_id: self.id,
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            private: self.private,
            url: self.html_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRepositoryPayload {
    pub(crate) repository: RawRepository,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRef {
    #[serde(rename = "ref")]
    pub(crate) ref_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPullRequest {
    pub(crate) id: u64,
    pub(crate) number: u64,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) state: Option<String>,
    #[serde(default)]
    pub(crate) draft: bool,
    #[serde(default)]
    pub(crate) merged: Option<bool>,
    #[serde(default)]
    pub(crate) merged_at: Option<String>,
    pub(crate) base: RawRef,
    pub(crate) head: RawRef,
    #[serde(default)]
    pub(crate) user: Option<RawUser>,
}

impl RawPullRequest {
    /// Whether GitHub reports the pull request as merged.
    pub(crate) fn is_merged(&self) -> bool {
        self.merged.unwrap_or(false) || self.merged_at.is_some()
    }

    /// Lifecycle state implied by the payload.
    pub(crate) fn status(&self) -> PullRequestState {
        if self.is_merged() {
            PullRequestState::Merged
        } else if self.state.as_deref() == Some("closed") {
            PullRequestState::Closed
        } else {
            PullRequestState::Open
        }
    }

    pub(crate) fn to_record(
        &self,
        repository_id: u64,
        status: PullRequestState,
    ) -> PullRequestRecord {
        PullRequestRecord {
            platform_id: self.id,
            repository_id,
            number: self.number,
            title: self.title.clone(),
            status,
            draft: self.draft,
            is_ready: !self.draft,
            base_branch: self.base.ref_name.clone(),
            head_branch: self.head.ref_name.clone(),
            author_id: self.user.as_ref().map(|user| user.id),
            metadata: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPullRequestPayload {
    pub(crate) pull_request: RawPullRequest,
    pub(crate) repository: RawRepository,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPullRequestId {
    pub(crate) id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawReview {
    pub(crate) id: u64,
    pub(crate) user: RawUser,
    #[serde(default)]
    pub(crate) body: Option<String>,
    pub(crate) state: String,
    #[serde(default)]
    pub(crate) submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawReviewPayload {
    pub(crate) review: RawReview,
    pub(crate) pull_request: RawPullRequestId,
}
