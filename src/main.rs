//! Octolens CLI entrypoint.

mod cli;

use std::io::{self, Write};
use std::process::ExitCode;

use octolens::{OctolensConfig, OperationMode};
use ortho_config::OrthoConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if writeln!(io::stderr().lock(), "{error}").is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::FAILURE
        }
    }
}

/// Installs the `tracing` subscriber; logs go to stderr so stdout stays
/// reserved for reports.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "octolens=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn run() -> Result<(), CliError> {
    let config = load_config()?;

    match config.operation_mode() {
        OperationMode::MigrateDatabase => cli::migrations::run(&config),
        OperationMode::ApplyWebhook => cli::webhook::run(&config),
        OperationMode::PullRequestReport => cli::report::run_pull_request(&config).await,
        OperationMode::RepositoryReport => cli::report::run_repository(&config).await,
        OperationMode::Incomplete => Err(CliError::Configuration {
            message: concat!(
                "nothing to do: pass --migrate-db, --webhook-event with --webhook-payload, ",
                "--owner with --repo, or --repository"
            )
            .to_owned(),
        }),
    }
}

/// Loads configuration from CLI, environment, and files.
///
/// # Errors
///
/// Returns [`CliError::Configuration`] when ortho-config fails to parse
/// arguments or load configuration files.
fn load_config() -> Result<OctolensConfig, CliError> {
    OctolensConfig::load().map_err(|error| CliError::Configuration {
        message: error.to_string(),
    })
}
