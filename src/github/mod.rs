//! Resilient GitHub REST client.
//!
//! Calls flow from [`GitHubClient`] through a per-client [`ResponseCache`]
//! into the [`RetryEngine`], which consults the [`RateGate`] before every
//! attempt and classifies failures with [`classify`]. The wire is reached
//! through the [`Transport`] trait so the machinery can be exercised without
//! a network.

pub mod cache;
pub mod classify;
pub mod client;
pub mod error;
pub mod fault;
pub mod locator;
pub mod models;
pub mod rate_gate;
pub mod rate_limit;
pub mod retry;
pub mod transport;

pub use cache::{CacheEntry, CacheKey, Operation, ResponseCache};
pub use classify::classify;
pub use client::{AccessCheck, ClientSettings, GitHubClient};
pub use error::{ApiError, ClientError, ErrorContext, ErrorKind};
pub use fault::{Fault, TransportCode};
pub use locator::{
    PersonalAccessToken, PullRequestNumber, RepositoryLocator, RepositoryName, RepositoryOwner,
};
pub use models::{
    MergeType, MergeableState, PullRequest, PullRequestReview, PullRequestState, Repository,
    RepositorySettings, ReviewState, ReviewUser, UserRole,
};
pub use rate_gate::RateGate;
pub use rate_limit::RateLimitInfo;
pub use retry::{RetryConfig, RetryEngine};
pub use transport::{OctocrabTransport, Transport, TransportResponse};
