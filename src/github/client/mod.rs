//! Resilient GitHub client façade.
//!
//! [`GitHubClient`] composes the response caches, the retry engine, and the
//! rate gate over a [`Transport`]. Each instance owns its own caches and gate,
//! so two clients never share state.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::cache::{CacheKey, Operation, ResponseCache};
use super::error::ClientError;
use super::fault::Fault;
use super::locator::{PersonalAccessToken, PullRequestNumber, RepositoryLocator};
use super::models::{
    ApiPullRequest, ApiRepository, ApiReview, PullRequest, PullRequestReview, Repository,
    reviews_from_api,
};
use super::rate_gate::{DEFAULT_MAX_WAIT_SECONDS, RateGate};
use super::retry::{RetryConfig, RetryEngine};
use super::transport::{OctocrabTransport, Transport};
use crate::persistence::Store;
use crate::telemetry::TelemetrySink;

/// Header listing the OAuth scopes granted to the token.
const OAUTH_SCOPES_HEADER: &str = "x-oauth-scopes";

/// Scope granting access to private repositories.
const REPO_SCOPE: &str = "repo";

/// Default request timeout, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Tunables for a [`GitHubClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// Backoff schedule for transient failures.
    pub retry: RetryConfig,
    /// Longest rate gate suspension.
    pub max_wait: Duration,
    /// Connect and read timeout for each request.
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            retry: RetryConfig::DEFAULT,
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECONDS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }
}

/// Outcome of [`GitHubClient::check_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessCheck {
    /// True when the repository is private and the token lacks the `repo`
    /// scope.
    pub needs_access: bool,
    /// Whether the repository is private.
    pub is_private: bool,
}

/// GitHub API client with caching, retries, and rate limit awareness.
pub struct GitHubClient {
    transport: Arc<dyn Transport>,
    gate: RateGate,
    retry: RetryEngine,
    repositories: ResponseCache<Repository, ClientError>,
    pull_requests: ResponseCache<PullRequest, ClientError>,
    reviews: ResponseCache<Vec<PullRequestReview>, ClientError>,
    scopes: Mutex<Option<BTreeSet<String>>>,
    store: Mutex<Option<Arc<dyn Store>>>,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GitHubClient")
            .field("gate", &self.gate)
            .field("retry", &self.retry)
            .field("cached_repositories", &self.repositories.len())
            .field("cached_pull_requests", &self.pull_requests.len())
            .field("cached_reviews", &self.reviews.len())
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Creates a client over an arbitrary transport.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        settings: ClientSettings,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            transport,
            gate: RateGate::new(settings.max_wait, Arc::clone(&telemetry)),
            retry: RetryEngine::new(settings.retry, telemetry),
            repositories: ResponseCache::new(),
            pull_requests: ResponseCache::new(),
            reviews: ResponseCache::new(),
            scopes: Mutex::new(None),
            store: Mutex::new(None),
        }
    }

    /// Creates a client authenticated with a personal access token.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] or [`ClientError::Configuration`]
    /// when the Octocrab transport cannot be built.
    pub fn for_token(
        token: &PersonalAccessToken,
        api_base: &str,
        settings: ClientSettings,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, ClientError> {
        let transport = OctocrabTransport::for_token(token, api_base, settings.request_timeout)?;
        Ok(Self::new(Arc::new(transport), settings, telemetry))
    }

    /// Attaches the persistence handle released by [`Self::destroy`].
    #[must_use]
    pub fn with_store(self, store: Arc<dyn Store>) -> Self {
        *self.store.lock().unwrap_or_else(PoisonError::into_inner) = Some(store);
        self
    }

    /// Returns the attached persistence handle, if it has not been released.
    #[must_use]
    pub fn store(&self) -> Option<Arc<dyn Store>> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the rate gate shared by every call of this client.
    #[must_use]
    pub const fn rate_gate(&self) -> &RateGate {
        &self.gate
    }

    /// Returns the OAuth scopes reported by the most recent response, if the
    /// API reported any.
    #[must_use]
    pub fn token_scopes(&self) -> Option<BTreeSet<String>> {
        self.scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetches repository metadata and merge settings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] when GitHub rejects the request or cannot
    /// be reached after retries.
    pub async fn repository(&self, locator: &RepositoryLocator) -> Result<Repository, ClientError> {
        let key = CacheKey::repository(locator.owner().as_str(), locator.repository().as_str());
        let path = locator.repository_path();
        let result = self
            .repositories
            .get_or_fetch(key, || async move {
                let payload: ApiRepository = self.fetch(Operation::GetRepository, &path).await?;
                Ok(Repository::from(payload))
            })
            .await;
        self.settle(Operation::GetRepository, result)
    }

    /// Fetches one pull request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] when GitHub rejects the request or cannot
    /// be reached after retries.
    pub async fn pull_request(
        &self,
        locator: &RepositoryLocator,
        number: PullRequestNumber,
    ) -> Result<PullRequest, ClientError> {
        let key = pull_request_key(Operation::GetPullRequest, locator, number);
        let path = locator.pull_request_path(number);
        let result = self
            .pull_requests
            .get_or_fetch(key, || async move {
                let payload: ApiPullRequest = self.fetch(Operation::GetPullRequest, &path).await?;
                Ok(PullRequest::from(payload))
            })
            .await;
        self.settle(Operation::GetPullRequest, result)
    }

    /// Fetches every review of a pull request in submission order.
    ///
    /// The user check runs once the listing has been received and is never
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DataIntegrity`] when any review lacks a user, or
    /// [`ClientError::Api`] when the request fails.
    pub async fn pull_request_reviews(
        &self,
        locator: &RepositoryLocator,
        number: PullRequestNumber,
    ) -> Result<Vec<PullRequestReview>, ClientError> {
        let key = pull_request_key(Operation::GetPullRequestReviews, locator, number);
        let path = locator.reviews_path(number);
        let result = self
            .reviews
            .get_or_fetch(key, || async move {
                let payload: Vec<ApiReview> =
                    self.fetch(Operation::GetPullRequestReviews, &path).await?;
                reviews_from_api(payload, Utc::now())
            })
            .await;
        self.settle(Operation::GetPullRequestReviews, result)
    }

    /// Reports whether the token can see a repository.
    ///
    /// # Errors
    ///
    /// Propagates failures of [`Self::repository`].
    pub async fn check_access(
        &self,
        locator: &RepositoryLocator,
    ) -> Result<AccessCheck, ClientError> {
        let repository = self.repository(locator).await?;
        let has_repo_scope = self
            .token_scopes()
            .is_some_and(|scopes| scopes.contains(REPO_SCOPE));
        Ok(AccessCheck {
            needs_access: repository.private && !has_repo_scope,
            is_private: repository.private,
        })
    }

    /// Clears every cache and releases the persistence handle.
    ///
    /// Calling it again after a successful release does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Destroy`] when the store fails to disconnect.
    pub fn destroy(&self) -> Result<(), ClientError> {
        self.clear_caches();
        let released = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(store) = released else {
            return Ok(());
        };
        store.disconnect().map_err(|error| ClientError::Destroy {
            message: error.to_string(),
        })
    }

    /// Drops every cached response.
    pub fn clear_caches(&self) {
        self.repositories.clear_all();
        self.pull_requests.clear_all();
        self.reviews.clear_all();
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: Operation,
        path: &str,
    ) -> Result<T, ClientError> {
        let client = self;
        let value = self
            .retry
            .execute(operation.as_str(), &self.gate, self.transport.as_ref(), move || {
                client.attempt::<T>(path)
            })
            .await?;
        Ok(value)
    }

    async fn attempt<T: DeserializeOwned>(&self, path: &str) -> Result<T, Fault> {
        match self.transport.get(path).await {
            Ok(response) => {
                self.gate.observe(&response.headers);
                self.remember_scopes(&response.headers);
                response.json(path)
            }
            Err(fault) => {
                self.gate.observe_fault(&fault);
                Err(fault)
            }
        }
    }

    fn remember_scopes(&self, headers: &HeaderMap) {
        let Some(raw) = headers
            .get(OAUTH_SCOPES_HEADER)
            .and_then(|value| value.to_str().ok())
        else {
            return;
        };
        let scopes = raw
            .split(',')
            .map(str::trim)
            .filter(|scope| !scope.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        *self.scopes.lock().unwrap_or_else(PoisonError::into_inner) = Some(scopes);
    }

    fn settle<T>(
        &self,
        operation: Operation,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        result.inspect_err(|error| {
            debug!(%operation, %error, "clearing caches after failed call");
            self.clear_caches();
        })
    }
}

fn pull_request_key(
    operation: Operation,
    locator: &RepositoryLocator,
    number: PullRequestNumber,
) -> CacheKey {
    CacheKey::pull_request(
        operation,
        locator.owner().as_str(),
        locator.repository().as_str(),
        number.get(),
    )
}
