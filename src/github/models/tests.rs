//! Tests for wire payload conversion.

use std::collections::BTreeSet;

use chrono::{TimeZone, Utc};
use rstest::rstest;
use serde_json::json;

use super::test_support::{
    pull_request_payload, repository_payload, review_payload, review_without_user,
};
use super::{
    ApiPullRequest, ApiRepository, ApiReview, MISSING_REVIEW_USER, MergeType, MergeableState,
    PullRequest, PullRequestState, Repository, ReviewState, allowed_merge_types,
    reviews_from_api,
};
use crate::github::error::ClientError;

fn repository_from(value: serde_json::Value) -> Repository {
    serde_json::from_value::<ApiRepository>(value)
        .expect("repository payload should deserialise")
        .into()
}

fn pull_request_from(value: serde_json::Value) -> PullRequest {
    serde_json::from_value::<ApiPullRequest>(value)
        .expect("pull request payload should deserialise")
        .into()
}

fn review_from(value: serde_json::Value) -> ApiReview {
    serde_json::from_value(value).expect("review payload should deserialise")
}

#[test]
fn repository_settings_follow_upstream_flags() {
    let mut payload = repository_payload("octo", "cat");
    payload["allow_rebase_merge"] = json!(false);

    let repository = repository_from(payload);

    assert_eq!(repository.full_name, "octo/cat");
    assert!(repository.settings.auto_merge_enabled);
    assert!(!repository.settings.require_approvals);
    assert_eq!(repository.settings.protected_branches, vec!["main".to_owned()]);
    assert_eq!(
        repository.settings.allowed_merge_types,
        BTreeSet::from([MergeType::Merge, MergeType::Squash])
    );
}

#[rstest]
#[case::all_absent(None, None, None, &[MergeType::Merge, MergeType::Squash, MergeType::Rebase])]
#[case::all_disabled(Some(false), Some(false), Some(false), &[MergeType::Merge])]
#[case::squash_only(Some(false), Some(true), Some(false), &[MergeType::Squash])]
#[case::rebase_absent(Some(false), Some(false), None, &[MergeType::Rebase])]
fn merge_types_are_never_empty(
    #[case] merge: Option<bool>,
    #[case] squash: Option<bool>,
    #[case] rebase: Option<bool>,
    #[case] expected: &[MergeType],
) {
    let allowed = allowed_merge_types(merge, squash, rebase);

    assert_eq!(allowed, expected.iter().copied().collect::<BTreeSet<_>>());
}

#[test]
fn repository_defaults_missing_optional_fields() {
    let repository = repository_from(json!({
        "id": 7,
        "name": "cat",
        "full_name": "octo/cat"
    }));

    assert_eq!(repository.default_branch, "main");
    assert!(!repository.private);
    assert!(!repository.settings.auto_merge_enabled);
    assert_eq!(repository.settings.allowed_merge_types.len(), 3);
}

#[test]
fn pull_request_maps_core_fields() {
    let pull_request = pull_request_from(pull_request_payload(42));

    assert_eq!(pull_request.number, 42);
    assert_eq!(pull_request.state, PullRequestState::Open);
    assert_eq!(pull_request.mergeable_state, MergeableState::Mergeable);
    assert_eq!(pull_request.base_branch, "main");
    assert_eq!(pull_request.head_branch, "feature-42");
    assert_eq!(pull_request.author.as_deref(), Some("octocat"));
    assert!(pull_request.labels.contains("enhancement"));
}

#[test]
fn closed_pull_request_with_merge_time_is_merged() {
    let mut payload = pull_request_payload(5);
    payload["state"] = json!("closed");
    payload["merged_at"] = json!("2026-01-04T00:00:00Z");

    assert_eq!(pull_request_from(payload).state, PullRequestState::Merged);
}

#[test]
fn closed_pull_request_without_merge_time_is_closed() {
    let mut payload = pull_request_payload(5);
    payload["state"] = json!("closed");

    assert_eq!(pull_request_from(payload).state, PullRequestState::Closed);
}

#[rstest]
#[case(Some("dirty"), MergeableState::Conflicting)]
#[case(Some("clean"), MergeableState::Mergeable)]
#[case(Some("unstable"), MergeableState::Mergeable)]
#[case(Some("blocked"), MergeableState::Unknown)]
#[case(None, MergeableState::Unknown)]
fn maps_mergeable_state(#[case] raw: Option<&str>, #[case] expected: MergeableState) {
    assert_eq!(MergeableState::from_api(raw), expected);
}

#[test]
fn absent_mergeable_state_defaults_to_unknown() {
    let mut payload = pull_request_payload(9);
    payload
        .as_object_mut()
        .expect("payload should be an object")
        .remove("mergeable_state");

    assert_eq!(
        pull_request_from(payload).mergeable_state,
        MergeableState::Unknown
    );
}

#[test]
fn pull_request_missing_required_fields_does_not_deserialise() {
    let result = serde_json::from_value::<ApiPullRequest>(json!({ "number": 1 }));

    assert!(result.is_err());
}

#[test]
fn review_defaults_optional_fields() {
    let now = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).single().expect("valid time");
    let review = review_from(json!({
        "id": 3,
        "user": { "login": "alice" },
        "body": null,
        "state": "COMMENTED",
        "commit_id": null,
        "submitted_at": null
    }))
    .into_review(now)
    .expect("review should convert");

    assert_eq!(review.body, "");
    assert_eq!(review.commit_id, "");
    assert_eq!(review.submitted_at, now);
    assert_eq!(review.user.login, "alice");
    assert_eq!(review.state, ReviewState::Commented);
}

#[test]
fn review_without_user_is_a_data_integrity_error() {
    let reviews = vec![
        review_from(review_payload(1, "alice", "APPROVED")),
        review_from(review_without_user(2)),
    ];

    let result = reviews_from_api(reviews, Utc::now());

    assert_eq!(
        result,
        Err(ClientError::DataIntegrity {
            message: MISSING_REVIEW_USER.to_owned(),
        })
    );
}

#[test]
fn reviews_keep_repeats_in_submission_order() {
    let mut later = review_payload(2, "alice", "APPROVED");
    later["submitted_at"] = json!("2026-01-05T00:00:00Z");
    let reviews = vec![
        review_from(later),
        review_from(review_payload(1, "alice", "CHANGES_REQUESTED")),
    ];

    let converted = reviews_from_api(reviews, Utc::now()).expect("reviews should convert");

    let ids: Vec<u64> = converted.iter().map(|review| review.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(converted.first().map(|review| review.state), Some(ReviewState::ChangesRequested));
}

#[rstest]
#[case("APPROVED", ReviewState::Approved)]
#[case("approved", ReviewState::Approved)]
#[case("changes_requested", ReviewState::ChangesRequested)]
#[case("DISMISSED", ReviewState::Dismissed)]
#[case("PENDING", ReviewState::Pending)]
#[case("something_new", ReviewState::Pending)]
fn parses_review_states(#[case] raw: &str, #[case] expected: ReviewState) {
    assert_eq!(ReviewState::parse(raw), expected);
}
