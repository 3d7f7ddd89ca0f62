//! Octolens library crate: a resilient GitHub API client with webhook-driven
//! persistence.
//!
//! The [`github`] module fetches repositories, pull requests, and reviews
//! through per-client caches, a retry engine, and a rate limit gate. The
//! [`webhooks`] module applies GitHub deliveries to the local `SQLite` store
//! in [`persistence`].

pub mod config;
pub mod github;
pub mod persistence;
pub mod telemetry;
pub mod webhooks;

pub use config::{OctolensConfig, OperationMode};
pub use github::{
    AccessCheck, ClientError, ClientSettings, ErrorKind, GitHubClient, PersonalAccessToken,
    PullRequest, PullRequestNumber, PullRequestReview, Repository, RepositoryLocator,
};
pub use persistence::{PersistenceError, SqliteStore, Store};
pub use webhooks::{WebhookError, WebhookOutcome, WebhookProcessor};
