//! Repository and pull request reports fetched through [`GitHubClient`].
//!
//! When a database URL is configured the fetched repository and pull request
//! are mirrored into the local store before the report is printed.

use std::sync::Arc;

use octolens::persistence::{PullRequestRecord, RepositoryRecord};
use octolens::telemetry::{StderrJsonlTelemetrySink, TelemetrySink};
use octolens::{
    GitHubClient, OctolensConfig, PullRequest, PullRequestNumber, Repository, RepositoryLocator,
    Store,
};
use tracing::debug;

use super::CliError;
use super::migrations::{map_persistence_error, open_migrated_store};
use super::output::{write_pull_request_report, write_repository_report};

/// Reports on the configured repository.
///
/// # Errors
///
/// Returns [`CliError::Client`] if configuration is incomplete or the API
/// request fails, and [`CliError::Io`] if persisting or printing fails.
pub async fn run_repository(config: &OctolensConfig) -> Result<(), CliError> {
    let locator = config.require_repository_info()?;
    let client = build_client(config)?;

    let outcome = report_repository(&client, &locator).await;
    release(&client, outcome)
}

/// Reports on the configured pull request and its reviews.
///
/// # Errors
///
/// Returns [`CliError::Client`] if configuration is incomplete or any API
/// request fails, and [`CliError::Io`] if persisting or printing fails.
pub async fn run_pull_request(config: &OctolensConfig) -> Result<(), CliError> {
    let locator = config.require_repository_info()?;
    let number = config.require_pull_request_number()?;
    let client = build_client(config)?;

    let outcome = report_pull_request(&client, &locator, number).await;
    release(&client, outcome)
}

async fn report_repository(
    client: &GitHubClient,
    locator: &RepositoryLocator,
) -> Result<(), CliError> {
    let repository = client.repository(locator).await?;
    let access = client.check_access(locator).await?;
    mirror(client, &repository, None)?;

    write_repository_report(&repository, access)
}

async fn report_pull_request(
    client: &GitHubClient,
    locator: &RepositoryLocator,
    number: PullRequestNumber,
) -> Result<(), CliError> {
    let repository = client.repository(locator).await?;
    let pull_request = client.pull_request(locator, number).await?;
    let reviews = client.pull_request_reviews(locator, number).await?;
    mirror(client, &repository, Some(&pull_request))?;

    write_pull_request_report(&pull_request, &reviews)
}

/// Destroys the client whether or not the report succeeded.
///
/// A report failure takes precedence over a destroy failure.
fn release(client: &GitHubClient, outcome: Result<(), CliError>) -> Result<(), CliError> {
    let destroyed = client.destroy();
    outcome?;
    destroyed.map_err(CliError::from)
}

fn mirror(
    client: &GitHubClient,
    repository: &Repository,
    pull_request: Option<&PullRequest>,
) -> Result<(), CliError> {
    let Some(store) = client.store() else {
        return Ok(());
    };
    write_records(store.as_ref(), repository, pull_request)
}

fn write_records(
    store: &dyn Store,
    repository: &Repository,
    pull_request: Option<&PullRequest>,
) -> Result<(), CliError> {
    store
        .upsert_repository(&RepositoryRecord::from_repository(repository))
        .map_err(|error| map_persistence_error(&error))?;

    if let Some(fetched) = pull_request {
        store
            .upsert_pull_request(&PullRequestRecord::from_pull_request(
                repository.id,
                fetched,
            ))
            .map_err(|error| map_persistence_error(&error))?;
    }
    debug!(repository = %repository.full_name, "mirrored fetched records");
    Ok(())
}
