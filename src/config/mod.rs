//! Application configuration loaded from CLI, environment, and files.
//!
//! This module provides a unified configuration struct that merges values
//! from command-line arguments, environment variables, and configuration
//! files using ortho-config's layered approach.
//!
//! # Precedence
//!
//! Configuration values are loaded with the following precedence (lowest to
//! highest):
//!
//! 1. **Defaults** – Built-in application defaults
//! 2. **Configuration file** – `.octolens.toml` in the current directory,
//!    home directory, or XDG config directory
//! 3. **Environment variables** – `OCTOLENS_*`, plus the legacy
//!    `GITHUB_TOKEN` for the token
//! 4. **Command-line arguments** – `--owner`/`-o`, `--token`/`-t`, ...
//!
//! # Configuration File
//!
//! ```toml
//! token = "ghp_example"
//! owner = "octocat"
//! repo = "hello-world"
//! # or: repository = "https://github.com/octocat/hello-world"
//! pr_number = 42
//! database_url = "octolens.sqlite"
//! max_retries = 3
//! rate_limit_max_wait_seconds = 900
//! ```

use std::env;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use crate::github::client::{ClientSettings, DEFAULT_REQUEST_TIMEOUT_SECONDS};
use crate::github::error::ClientError;
use crate::github::locator::{
    DEFAULT_API_BASE, PersonalAccessToken, PullRequestNumber, RepositoryLocator,
};
use crate::github::rate_gate::DEFAULT_MAX_WAIT_SECONDS;
use crate::github::retry::RetryConfig;

const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Operation mode determined by the supplied configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Run database migrations and exit.
    MigrateDatabase,
    /// Apply one webhook payload to the database.
    ApplyWebhook,
    /// Report on one pull request and its reviews.
    PullRequestReport,
    /// Report on one repository.
    RepositoryReport,
    /// Not enough configuration to do anything.
    Incomplete,
}

/// Application configuration supporting CLI, environment, and file sources.
///
/// # Environment Variables
///
/// - `OCTOLENS_TOKEN`, `GITHUB_TOKEN`, or `--token`: Authentication token
/// - `OCTOLENS_OWNER` or `--owner`: Repository owner
/// - `OCTOLENS_REPO` or `--repo`: Repository name
/// - `OCTOLENS_REPOSITORY` or `--repository`: `owner/name` or repository URL
/// - `OCTOLENS_PR_NUMBER` or `--pr-number`: Pull request number
/// - `OCTOLENS_DATABASE_URL` or `--database-url`: Local `SQLite` database path
///
/// # Example
///
/// ```no_run
/// use octolens::OctolensConfig;
/// use ortho_config::OrthoConfig;
///
/// let config = OctolensConfig::load().expect("failed to load configuration");
/// let locator = config.require_repository_info().expect("repository required");
/// let token = config.resolve_token().expect("token required");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "OCTOLENS",
    discovery(
        dotfile_name = ".octolens.toml",
        config_file_name = "octolens.toml",
        app_name = "octolens"
    )
)]
pub struct OctolensConfig {
    /// Personal access token for GitHub API authentication.
    ///
    /// Can be provided via:
    /// - CLI: `--token <TOKEN>` or `-t <TOKEN>`
    /// - Environment: `OCTOLENS_TOKEN` or `GITHUB_TOKEN` (legacy)
    /// - Config file: `token = "..."`
    #[ortho_config(cli_short = 't')]
    pub token: Option<String>,

    /// GitHub API base URL; set it for GitHub Enterprise hosts.
    #[ortho_config()]
    pub api_base: String,

    /// Repository owner (e.g., "octocat").
    #[ortho_config(cli_short = 'o')]
    pub owner: Option<String>,

    /// Repository name (e.g., "hello-world").
    #[ortho_config(cli_short = 'r')]
    pub repo: Option<String>,

    /// Repository as `owner/name` or a repository URL; used when `owner`
    /// and `repo` are not both given.
    #[ortho_config()]
    pub repository: Option<String>,

    /// Pull request number to report on.
    #[ortho_config(cli_short = 'p')]
    pub pr_number: Option<u64>,

    /// Local `SQLite` database URL/path used for persistence.
    ///
    /// Can be provided via:
    /// - CLI: `--database-url <PATH>`
    /// - Environment: `OCTOLENS_DATABASE_URL`
    /// - Config file: `database_url = "..."`
    #[ortho_config()]
    pub database_url: Option<String>,

    /// Runs database migrations and exits.
    #[ortho_config()]
    pub migrate_db: bool,

    /// Connect and read timeout for each GitHub request, in seconds.
    #[ortho_config()]
    pub request_timeout_seconds: u64,

    /// Retries after the first failed attempt of a transient failure.
    #[ortho_config()]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds; later retries double it.
    #[ortho_config()]
    pub retry_base_delay_ms: u64,

    /// Longest wait for a rate limit reset, in seconds.
    #[ortho_config()]
    pub rate_limit_max_wait_seconds: u64,

    /// Webhook event name (the `X-GitHub-Event` header) to apply.
    #[ortho_config()]
    pub webhook_event: Option<String>,

    /// Path to a JSON file holding the webhook payload.
    #[ortho_config()]
    pub webhook_payload: Option<String>,
}

impl Default for OctolensConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: DEFAULT_API_BASE.to_owned(),
            owner: None,
            repo: None,
            repository: None,
            pr_number: None,
            database_url: None,
            migrate_db: false,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            max_retries: RetryConfig::DEFAULT.max_retries,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            rate_limit_max_wait_seconds: DEFAULT_MAX_WAIT_SECONDS,
            webhook_event: None,
            webhook_payload: None,
        }
    }
}

impl OctolensConfig {
    /// Resolves the token from configuration or the legacy `GITHUB_TOKEN`
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingToken`] when no source provides a
    /// non-blank value.
    pub fn resolve_token(&self) -> Result<PersonalAccessToken, ClientError> {
        let raw = self
            .token
            .clone()
            .or_else(|| env::var("GITHUB_TOKEN").ok())
            .ok_or(ClientError::MissingToken)?;
        PersonalAccessToken::new(raw)
    }

    /// Returns the configured repository.
    ///
    /// Explicit `owner` and `repo` win over `repository`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when no repository is given,
    /// [`ClientError::InvalidUrl`] when `repository` is a malformed URL, or
    /// [`ClientError::InvalidIdentifier`] when a part is malformed.
    pub fn require_repository_info(&self) -> Result<RepositoryLocator, ClientError> {
        match (&self.owner, &self.repo, &self.repository) {
            (Some(owner), Some(repo), _) => RepositoryLocator::from_owner_repo(owner, repo),
            (_, _, Some(reference)) => RepositoryLocator::from_reference(reference),
            (None, _, None) => Err(ClientError::Configuration {
                message: "repository owner is required (use --owner or -o)".to_owned(),
            }),
            (_, None, None) => Err(ClientError::Configuration {
                message: "repository name is required (use --repo or -r)".to_owned(),
            }),
        }
    }

    /// Returns the configured pull request number.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when it is missing or
    /// [`ClientError::InvalidIdentifier`] when it is zero.
    pub fn require_pull_request_number(&self) -> Result<PullRequestNumber, ClientError> {
        let number = self.pr_number.ok_or_else(|| ClientError::Configuration {
            message: "pull request number is required (use --pr-number or -p)".to_owned(),
        })?;
        PullRequestNumber::new(number)
    }

    /// Returns the webhook event name and payload path when both are set.
    #[must_use]
    pub fn webhook_source(&self) -> Option<(&str, &str)> {
        self.webhook_event
            .as_deref()
            .zip(self.webhook_payload.as_deref())
    }

    /// Determines the operation mode based on provided configuration.
    ///
    /// Migration wins over everything else, then webhook application, then
    /// the pull request report, then the repository report.
    #[must_use]
    pub const fn operation_mode(&self) -> OperationMode {
        if self.migrate_db {
            OperationMode::MigrateDatabase
        } else if self.webhook_event.is_some() && self.webhook_payload.is_some() {
            OperationMode::ApplyWebhook
        } else if self.names_repository() && self.pr_number.is_some() {
            OperationMode::PullRequestReport
        } else if self.names_repository() {
            OperationMode::RepositoryReport
        } else {
            OperationMode::Incomplete
        }
    }

    const fn names_repository(&self) -> bool {
        (self.owner.is_some() && self.repo.is_some()) || self.repository.is_some()
    }

    /// Builds client tunables from the configured limits.
    #[must_use]
    pub const fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            retry: RetryConfig::new(
                self.max_retries,
                Duration::from_millis(self.retry_base_delay_ms),
            ),
            max_wait: Duration::from_secs(self.rate_limit_max_wait_seconds),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
        }
    }
}

#[cfg(test)]
mod tests;
