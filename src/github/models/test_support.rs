//! JSON payload builders for GitHub REST responses.
//!
//! The builders return `serde_json::Value`s shaped like real API responses so
//! transport fakes and `wiremock` servers can serve them directly.
//!
//! # Examples
//!
//! ```
//! use octolens::github::models::test_support::{repository_payload, review_payload};
//!
//! let repository = repository_payload("octo", "cat");
//! assert_eq!(repository["full_name"], "octo/cat");
//!
//! let review = review_payload(7, "alice", "APPROVED");
//! assert_eq!(review["user"]["login"], "alice");
//! ```

use serde_json::{Value, json};

/// Repository payload with every merge strategy enabled.
#[must_use]
pub fn repository_payload(owner: &str, name: &str) -> Value {
    json!({
        "id": 1_296_269,
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "private": false,
        "description": "Test repository",
        "default_branch": "main",
        "language": "Rust",
        "stargazers_count": 80,
        "forks_count": 9,
        "html_url": format!("https://github.com/{owner}/{name}"),
        "allow_auto_merge": true,
        "allow_merge_commit": true,
        "allow_squash_merge": true,
        "allow_rebase_merge": true
    })
}

/// Private variant of [`repository_payload`].
#[must_use]
pub fn private_repository_payload(owner: &str, name: &str) -> Value {
    let mut payload = repository_payload(owner, name);
    payload["private"] = Value::Bool(true);
    payload
}

/// Open pull request payload.
#[must_use]
pub fn pull_request_payload(number: u64) -> Value {
    json!({
        "id": 1_000 + number,
        "number": number,
        "title": format!("Pull request {number}"),
        "body": "Adds a feature",
        "state": "open",
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-02T00:00:00Z",
        "merged_at": null,
        "draft": false,
        "mergeable": true,
        "rebaseable": true,
        "mergeable_state": "clean",
        "additions": 10,
        "deletions": 2,
        "changed_files": 3,
        "labels": [{ "name": "enhancement" }],
        "user": { "login": "octocat", "type": "User" },
        "base": { "ref": "main" },
        "head": { "ref": format!("feature-{number}") }
    })
}

/// Submitted review payload.
#[must_use]
pub fn review_payload(id: u64, login: &str, state: &str) -> Value {
    json!({
        "id": id,
        "user": {
            "login": login,
            "avatar_url": format!("https://avatars.example.com/{login}"),
            "type": "User"
        },
        "body": format!("Review {id}"),
        "state": state,
        "commit_id": "abc123",
        "submitted_at": "2026-01-03T00:00:00Z"
    })
}

/// Review payload whose `user` is null.
#[must_use]
pub fn review_without_user(id: u64) -> Value {
    let mut payload = review_payload(id, "ghost", "COMMENTED");
    payload["user"] = Value::Null;
    payload
}
