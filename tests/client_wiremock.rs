//! End-to-end client tests against a `wiremock` GitHub API.
//!
//! These exercise the real Octocrab transport, so status mapping, header
//! observation, and retry counts are checked on the wire rather than through
//! a fake transport.

use std::sync::Arc;
use std::time::Duration;

use octolens::github::models::test_support::{
    private_repository_payload, pull_request_payload, repository_payload, review_payload,
    review_without_user,
};
use octolens::github::{ReviewState, RetryConfig};
use octolens::telemetry::test_support::RecordingSink;
use octolens::telemetry::{TelemetryEvent, TelemetrySink};
use octolens::{
    ClientError, ClientSettings, ErrorKind, GitHubClient, PersonalAccessToken, PullRequestNumber,
    RepositoryLocator,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPOSITORY_PATH: &str = "/repos/octo/cat";

struct Harness {
    server: MockServer,
    client: GitHubClient,
    sink: Arc<RecordingSink>,
    locator: RepositoryLocator,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": {
                    "core": { "limit": 5000, "used": 1, "remaining": 4999, "reset": 4_102_444_800_u64 }
                }
            })))
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let telemetry: Arc<dyn TelemetrySink> = sink.clone();
        let token = PersonalAccessToken::new("ghp_example")
            .unwrap_or_else(|error| panic!("token should be valid: {error}"));
        let settings = ClientSettings {
            retry: RetryConfig::new(3, Duration::from_millis(5)),
            ..ClientSettings::default()
        };
        let client = GitHubClient::for_token(&token, &server.uri(), settings, telemetry)
            .unwrap_or_else(|error| panic!("client should build: {error}"));
        let locator = RepositoryLocator::from_owner_repo("octo", "cat")
            .unwrap_or_else(|error| panic!("locator should be valid: {error}"));

        Self {
            server,
            client,
            sink,
            locator,
        }
    }

    async fn requests_to(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }
}

fn number(value: u64) -> PullRequestNumber {
    PullRequestNumber::new(value)
        .unwrap_or_else(|error| panic!("pull request number should be valid: {error}"))
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(REPOSITORY_PATH))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "message": "Service Unavailable" })),
        )
        .up_to_n_times(2)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path(REPOSITORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository_payload("octo", "cat")))
        .mount(&harness.server)
        .await;

    let repository = harness
        .client
        .repository(&harness.locator)
        .await
        .unwrap_or_else(|error| panic!("repository should load after retries: {error}"));

    assert_eq!(repository.full_name, "octo/cat");
    assert_eq!(harness.requests_to(REPOSITORY_PATH).await, 3);
    let retries: Vec<u32> = harness
        .sink
        .take()
        .into_iter()
        .filter_map(|event| match event {
            TelemetryEvent::RetryScheduled { attempt, .. } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![1, 2]);
}

#[tokio::test]
async fn not_found_is_returned_without_retrying() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(REPOSITORY_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&harness.server)
        .await;

    let result = harness.client.repository(&harness.locator).await;

    let Err(error) = result else {
        panic!("expected a not-found error");
    };
    assert_eq!(error.kind(), Some(ErrorKind::NotFound));
    assert_eq!(harness.requests_to(REPOSITORY_PATH).await, 1);
}

#[tokio::test]
async fn repeated_fetches_are_served_from_the_cache() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(REPOSITORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository_payload("octo", "cat")))
        .mount(&harness.server)
        .await;

    for _ in 0..3 {
        harness
            .client
            .repository(&harness.locator)
            .await
            .unwrap_or_else(|error| panic!("repository should load: {error}"));
    }

    assert_eq!(harness.requests_to(REPOSITORY_PATH).await, 1);
}

#[tokio::test]
async fn reviews_arrive_in_submission_order() {
    let harness = Harness::start().await;
    let mut late = review_payload(2, "bob", "APPROVED");
    late["submitted_at"] = json!("2026-01-03T00:00:00Z");
    let mut early = review_payload(1, "alice", "CHANGES_REQUESTED");
    early["submitted_at"] = json!("2026-01-02T00:00:00Z");
    Mock::given(method("GET"))
        .and(path("/repos/octo/cat/pulls/7/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([late, early])))
        .mount(&harness.server)
        .await;

    let reviews = harness
        .client
        .pull_request_reviews(&harness.locator, number(7))
        .await
        .unwrap_or_else(|error| panic!("reviews should load: {error}"));

    let logins: Vec<&str> = reviews
        .iter()
        .map(|review| review.user.login.as_str())
        .collect();
    assert_eq!(logins, vec!["alice", "bob"]);
    assert_eq!(
        reviews.first().map(|review| review.state),
        Some(ReviewState::ChangesRequested)
    );
}

#[tokio::test]
async fn review_without_user_is_a_data_integrity_error() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/cat/pulls/7/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([review_without_user(3)])))
        .mount(&harness.server)
        .await;

    let result = harness
        .client
        .pull_request_reviews(&harness.locator, number(7))
        .await;

    assert!(matches!(result, Err(ClientError::DataIntegrity { .. })));
    assert_eq!(
        harness
            .requests_to("/repos/octo/cat/pulls/7/reviews")
            .await,
        1
    );
}

#[tokio::test]
async fn pull_request_is_fetched_by_number() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/cat/pulls/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pull_request_payload(7)))
        .mount(&harness.server)
        .await;

    let pull_request = harness
        .client
        .pull_request(&harness.locator, number(7))
        .await
        .unwrap_or_else(|error| panic!("pull request should load: {error}"));

    assert_eq!(pull_request.number, 7);
    assert_eq!(pull_request.base_branch, "main");
}

#[tokio::test]
async fn response_headers_update_the_rate_gate() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(REPOSITORY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(repository_payload("octo", "cat"))
                .insert_header("x-ratelimit-limit", "5000")
                .insert_header("x-ratelimit-remaining", "4321")
                .insert_header("x-ratelimit-reset", "4102444800"),
        )
        .mount(&harness.server)
        .await;

    harness
        .client
        .repository(&harness.locator)
        .await
        .unwrap_or_else(|error| panic!("repository should load: {error}"));

    assert_eq!(
        harness
            .client
            .rate_gate()
            .observed("core")
            .map(|info| info.remaining()),
        Some(4321)
    );
}

#[tokio::test]
async fn private_repository_needs_the_repo_scope() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(REPOSITORY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(private_repository_payload("octo", "cat"))
                .insert_header("x-oauth-scopes", "read:org, gist"),
        )
        .mount(&harness.server)
        .await;

    let access = harness
        .client
        .check_access(&harness.locator)
        .await
        .unwrap_or_else(|error| panic!("access check should succeed: {error}"));

    assert!(access.is_private);
    assert!(access.needs_access);
}

#[tokio::test]
async fn repo_scope_grants_private_access() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(REPOSITORY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(private_repository_payload("octo", "cat"))
                .insert_header("x-oauth-scopes", "repo, read:org"),
        )
        .mount(&harness.server)
        .await;

    let access = harness
        .client
        .check_access(&harness.locator)
        .await
        .unwrap_or_else(|error| panic!("access check should succeed: {error}"));

    assert!(access.is_private);
    assert!(!access.needs_access);
}
