//! Output formatting utilities for CLI operations.

use std::io::{self, Write};

use octolens::{AccessCheck, PullRequest, PullRequestReview, Repository, WebhookOutcome};

use super::CliError;

/// Writes a repository summary to stdout.
pub fn write_repository_report(
    repository: &Repository,
    access: AccessCheck,
) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    write_repository_report_to(&mut stdout, repository, access)
}

/// Writes a repository summary to the given writer.
pub fn write_repository_report_to<W: Write>(
    writer: &mut W,
    repository: &Repository,
    access: AccessCheck,
) -> Result<(), CliError> {
    let visibility = if repository.private {
        "private"
    } else {
        "public"
    };
    let description = repository
        .description
        .as_deref()
        .unwrap_or("no description");
    let merge_types = repository
        .settings
        .allowed_merge_types
        .iter()
        .map(|merge_type| format!("{merge_type:?}").to_lowercase())
        .collect::<Vec<_>>()
        .join(", ");

    writeln!(writer, "{} ({visibility})", repository.full_name).map_err(|e| io_error(&e))?;
    writeln!(writer, "  {description}").map_err(|e| io_error(&e))?;
    writeln!(
        writer,
        "  Default branch: {}; stars: {}; forks: {}",
        repository.default_branch, repository.stargazers_count, repository.forks_count
    )
    .map_err(|e| io_error(&e))?;
    writeln!(writer, "  Merge types: {merge_types}").map_err(|e| io_error(&e))?;

    if access.needs_access {
        writeln!(
            writer,
            "  Token lacks the `repo` scope required for this private repository."
        )
        .map_err(|e| io_error(&e))?;
    }
    Ok(())
}

/// Writes a pull request and its reviews to stdout.
pub fn write_pull_request_report(
    pull_request: &PullRequest,
    reviews: &[PullRequestReview],
) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    write_pull_request_report_to(&mut stdout, pull_request, reviews)
}

/// Writes a pull request and its reviews to the given writer.
pub fn write_pull_request_report_to<W: Write>(
    writer: &mut W,
    pull_request: &PullRequest,
    reviews: &[PullRequestReview],
) -> Result<(), CliError> {
    let author = pull_request.author.as_deref().unwrap_or("unknown author");
    let draft = if pull_request.draft { " (draft)" } else { "" };

    writeln!(
        writer,
        "PR #{} [{}]{draft} by {author}: {}",
        pull_request.number, pull_request.state, pull_request.title
    )
    .map_err(|e| io_error(&e))?;
    writeln!(
        writer,
        "  {} -> {}; +{} -{} in {} files",
        pull_request.head_branch,
        pull_request.base_branch,
        pull_request.additions,
        pull_request.deletions,
        pull_request.changed_files
    )
    .map_err(|e| io_error(&e))?;
    writeln!(writer, "Reviews: {}", reviews.len()).map_err(|e| io_error(&e))?;

    for review in reviews {
        writeln!(
            writer,
            "  {} {} @{}",
            review.submitted_at.to_rfc3339(),
            review.state,
            review.user.login
        )
        .map_err(|e| io_error(&e))?;
    }
    Ok(())
}

/// Writes the outcome of one webhook delivery to stdout.
pub fn write_webhook_outcome(
    event: &str,
    action: &str,
    outcome: WebhookOutcome,
) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    write_webhook_outcome_to(&mut stdout, event, action, outcome)
}

/// Writes the outcome of one webhook delivery to the given writer.
pub fn write_webhook_outcome_to<W: Write>(
    writer: &mut W,
    event: &str,
    action: &str,
    outcome: WebhookOutcome,
) -> Result<(), CliError> {
    let verdict = match outcome {
        WebhookOutcome::Applied => "applied",
        WebhookOutcome::Duplicate => "already applied",
        WebhookOutcome::Ignored => "ignored",
    };
    writeln!(writer, "{event}.{action}: {verdict}").map_err(|e| io_error(&e))
}

/// Converts an I/O error to a [`CliError::Io`].
pub(crate) fn io_error(error: &io::Error) -> CliError {
    CliError::Io {
        message: error.to_string(),
    }
}
