//! Domain models for repositories, pull requests, and reviews.
//!
//! Types prefixed with `Api` are deserialisation targets for GitHub REST
//! payloads. They convert into the public domain types, filling documented
//! defaults so callers never see a partially populated object.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ClientError;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Message of the data-integrity error raised for reviews without a user.
pub const MISSING_REVIEW_USER: &str = "review user data is missing";

/// Merge strategy a repository permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeType {
    /// Merge commit.
    Merge,
    /// Squash and merge.
    Squash,
    /// Rebase and merge.
    Rebase,
}

/// Repository merge and protection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositorySettings {
    /// Whether auto-merge may be enabled on pull requests.
    pub auto_merge_enabled: bool,
    /// Whether approvals are required before merging.
    pub require_approvals: bool,
    /// Branches treated as protected, in priority order.
    pub protected_branches: Vec<String>,
    /// Permitted merge strategies; never empty.
    pub allowed_merge_types: BTreeSet<MergeType>,
}

/// A GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    /// GitHub database identifier.
    pub id: u64,
    /// Repository name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Whether the repository is private.
    pub private: bool,
    /// Repository description.
    pub description: Option<String>,
    /// Default branch name.
    pub default_branch: String,
    /// Primary language.
    pub language: Option<String>,
    /// Star count.
    pub stargazers_count: u64,
    /// Fork count.
    pub forks_count: u64,
    /// Browser URL.
    pub html_url: Option<String>,
    /// Merge and protection settings.
    pub settings: RepositorySettings,
}

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestState {
    /// Open for review.
    Open,
    /// Closed without merging.
    Closed,
    /// Closed with `merged_at` set.
    Merged,
}

impl PullRequestState {
    /// Persisted status label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Merged => "MERGED",
        }
    }
}

impl fmt::Display for PullRequestState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Whether a pull request can be merged cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeableState {
    /// GitHub reports the branch as mergeable.
    Mergeable,
    /// The branch has merge conflicts.
    Conflicting,
    /// GitHub has not computed mergeability, or reported another state.
    Unknown,
}

impl MergeableState {
    /// Maps GitHub's `mergeable_state` string.
    #[must_use]
    pub fn from_api(value: Option<&str>) -> Self {
        match value {
            Some("dirty") => Self::Conflicting,
            Some("clean" | "unstable" | "has_hooks") => Self::Mergeable,
            _ => Self::Unknown,
        }
    }
}

/// A GitHub pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    /// GitHub database identifier.
    pub id: u64,
    /// Number within the repository.
    pub number: u64,
    /// Title.
    pub title: String,
    /// Description, empty when absent.
    pub body: String,
    /// Lifecycle state.
    pub state: PullRequestState,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Merge time.
    pub merged_at: Option<DateTime<Utc>>,
    /// Whether the pull request is a draft.
    pub draft: bool,
    /// `None` while GitHub is still computing mergeability.
    pub mergeable: Option<bool>,
    /// `None` while GitHub is still computing rebaseability.
    pub rebaseable: Option<bool>,
    /// Summarised mergeability.
    pub mergeable_state: MergeableState,
    /// Added lines.
    pub additions: u64,
    /// Removed lines.
    pub deletions: u64,
    /// Changed file count.
    pub changed_files: u64,
    /// Label names.
    pub labels: BTreeSet<String>,
    /// Author login.
    pub author: Option<String>,
    /// Target branch.
    pub base_branch: String,
    /// Source branch.
    pub head_branch: String,
}

/// State of a pull request review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    /// Approved the changes.
    Approved,
    /// Requested changes.
    ChangesRequested,
    /// Left comments only.
    Commented,
    /// Dismissed by a maintainer.
    Dismissed,
    /// Not yet submitted.
    Pending,
}

impl ReviewState {
    /// Parses GitHub's review state in either REST (`APPROVED`) or webhook
    /// (`approved`) casing. Unrecognised states are treated as pending.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "APPROVED" => Self::Approved,
            "CHANGES_REQUESTED" => Self::ChangesRequested,
            "COMMENTED" => Self::Commented,
            "DISMISSED" => Self::Dismissed,
            _ => Self::Pending,
        }
    }

    /// Persisted status label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::ChangesRequested => "CHANGES_REQUESTED",
            Self::Commented => "COMMENTED",
            Self::Dismissed => "DISMISSED",
            Self::Pending => "PENDING",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Role of a user attached to a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// The user reviewed the pull request.
    Reviewer,
}

/// Author of a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewUser {
    /// Login.
    pub login: String,
    /// Avatar URL, empty when absent.
    pub avatar_url: String,
    /// GitHub account type (`User`, `Bot`, ...).
    pub user_type: String,
    /// Always [`UserRole::Reviewer`].
    pub role: UserRole,
}

/// A submitted or pending pull request review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestReview {
    /// GitHub database identifier.
    pub id: u64,
    /// Reviewer.
    pub user: ReviewUser,
    /// Review text, empty when absent.
    pub body: String,
    /// Review state.
    pub state: ReviewState,
    /// Commit the review refers to, empty when absent.
    pub commit_id: String,
    /// Submission time; the conversion time when absent.
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiUser {
    pub(crate) login: Option<String>,
    pub(crate) avatar_url: Option<String>,
    #[serde(rename = "type")]
    pub(crate) user_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiRepository {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) full_name: String,
    #[serde(default)]
    pub(crate) private: bool,
    pub(crate) description: Option<String>,
    pub(crate) default_branch: Option<String>,
    pub(crate) language: Option<String>,
    #[serde(default)]
    pub(crate) stargazers_count: u64,
    #[serde(default)]
    pub(crate) forks_count: u64,
    pub(crate) html_url: Option<String>,
    pub(crate) allow_auto_merge: Option<bool>,
    pub(crate) allow_merge_commit: Option<bool>,
    pub(crate) allow_squash_merge: Option<bool>,
    pub(crate) allow_rebase_merge: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiLabel {
    pub(crate) name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiBranchRef {
    #[serde(rename = "ref")]
    pub(crate) ref_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiPullRequest {
    pub(crate) id: u64,
    pub(crate) number: u64,
    pub(crate) title: String,
    pub(crate) body: Option<String>,
    pub(crate) state: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) draft: bool,
    pub(crate) mergeable: Option<bool>,
    pub(crate) rebaseable: Option<bool>,
    pub(crate) mergeable_state: Option<String>,
    #[serde(default)]
    pub(crate) additions: u64,
    #[serde(default)]
    pub(crate) deletions: u64,
    #[serde(default)]
    pub(crate) changed_files: u64,
    #[serde(default)]
    pub(crate) labels: Vec<ApiLabel>,
    pub(crate) user: Option<ApiUser>,
    pub(crate) base: ApiBranchRef,
    pub(crate) head: ApiBranchRef,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiReview {
    pub(crate) id: u64,
    pub(crate) user: Option<ApiUser>,
    pub(crate) body: Option<String>,
    pub(crate) state: String,
    pub(crate) commit_id: Option<String>,
    pub(crate) submitted_at: Option<DateTime<Utc>>,
}

/// Derives the permitted merge strategies from GitHub's three allow flags.
///
/// Absent flags take GitHub's default of `true`. When every flag is false the
/// set falls back to a merge commit so it is never empty.
#[must_use]
pub fn allowed_merge_types(
    merge_commit: Option<bool>,
    squash: Option<bool>,
    rebase: Option<bool>,
) -> BTreeSet<MergeType> {
    let mut allowed: BTreeSet<MergeType> = [
        (merge_commit, MergeType::Merge),
        (squash, MergeType::Squash),
        (rebase, MergeType::Rebase),
    ]
    .into_iter()
    .filter(|(flag, _)| flag.unwrap_or(true))
    .map(|(_, merge_type)| merge_type)
    .collect();

    if allowed.is_empty() {
        allowed.insert(MergeType::Merge);
    }
    allowed
}

impl From<ApiRepository> for Repository {
    fn from(value: ApiRepository) -> Self {
        let default_branch = value.default_branch.unwrap_or_else(|| "main".to_owned());
        let settings = RepositorySettings {
            auto_merge_enabled: value.allow_auto_merge.unwrap_or(false),
            require_approvals: false,
            protected_branches: vec![default_branch.clone()],
            allowed_merge_types: allowed_merge_types(
                value.allow_merge_commit,
                value.allow_squash_merge,
                value.allow_rebase_merge,
            ),
        };

        Self {
            id: value.id,
            name: value.name,
            full_name: value.full_name,
            private: value.private,
            description: value.description,
            default_branch,
            language: value.language,
            stargazers_count: value.stargazers_count,
            forks_count: value.forks_count,
            html_url: value.html_url,
            settings,
        }
    }
}

impl From<ApiPullRequest> for PullRequest {
    fn from(value: ApiPullRequest) -> Self {
        let state = match (value.state.as_str(), value.merged_at) {
            ("open", _) => PullRequestState::Open,
            (_, Some(_)) => PullRequestState::Merged,
            _ => PullRequestState::Closed,
        };

        Self {
            id: value.id,
            number: value.number,
            title: value.title,
            body: value.body.unwrap_or_default(),
            state,
            created_at: value.created_at,
            updated_at: value.updated_at,
            merged_at: value.merged_at,
            draft: value.draft,
            mergeable: value.mergeable,
            rebaseable: value.rebaseable,
            mergeable_state: MergeableState::from_api(value.mergeable_state.as_deref()),
            additions: value.additions,
            deletions: value.deletions,
            changed_files: value.changed_files,
            labels: value.labels.into_iter().map(|label| label.name).collect(),
            author: value.user.and_then(|user| user.login),
            base_branch: value.base.ref_name,
            head_branch: value.head.ref_name,
        }
    }
}

impl ApiReview {
    /// Converts into a domain review, defaulting optional fields.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DataIntegrity`] when the review has no user
    /// login.
    pub(crate) fn into_review(self, now: DateTime<Utc>) -> Result<PullRequestReview, ClientError> {
        let user = self
            .user
            .and_then(|user| {
                user.login.map(|login| ReviewUser {
                    login,
                    avatar_url: user.avatar_url.unwrap_or_default(),
                    user_type: user.user_type.unwrap_or_else(|| "User".to_owned()),
                    role: UserRole::Reviewer,
                })
            })
            .ok_or_else(|| ClientError::DataIntegrity {
                message: MISSING_REVIEW_USER.to_owned(),
            })?;

        Ok(PullRequestReview {
            id: self.id,
            user,
            body: self.body.unwrap_or_default(),
            state: ReviewState::parse(&self.state),
            commit_id: self.commit_id.unwrap_or_default(),
            submitted_at: self.submitted_at.unwrap_or(now),
        })
    }
}

/// Converts a review listing, rejecting it whole if any review lacks a user.
///
/// Reviews are returned in submission order; reviews by the same user are all
/// kept.
pub(crate) fn reviews_from_api(
    reviews: Vec<ApiReview>,
    now: DateTime<Utc>,
) -> Result<Vec<PullRequestReview>, ClientError> {
    let mut converted = reviews
        .into_iter()
        .map(|review| review.into_review(now))
        .collect::<Result<Vec<_>, _>>()?;
    converted.sort_by_key(|review| review.submitted_at);
    Ok(converted)
}

#[cfg(test)]
mod tests;
