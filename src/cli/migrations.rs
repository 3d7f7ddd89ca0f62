//! Database migration operations.

use octolens::OctolensConfig;
use octolens::persistence::{PersistenceError, SqliteStore, migrate_database};
use octolens::telemetry::{StderrJsonlTelemetrySink, TelemetrySink};

use super::CliError;

/// Runs database migrations.
///
/// # Errors
///
/// Returns [`CliError::Configuration`] if the database URL is missing or blank.
/// Returns [`CliError::Io`] for connection or migration failures.
pub fn run(config: &OctolensConfig) -> Result<(), CliError> {
    let database_url = require_database_url(config)?;

    let telemetry = StderrJsonlTelemetrySink;
    migrate_database(database_url, &telemetry)
        .map(drop)
        .map_err(|error| map_persistence_error(&error))
}

/// Returns the configured database URL.
///
/// # Errors
///
/// Returns [`CliError::Configuration`] when no URL is configured.
pub fn require_database_url(config: &OctolensConfig) -> Result<&str, CliError> {
    config
        .database_url
        .as_deref()
        .ok_or_else(|| CliError::Configuration {
            message: PersistenceError::MissingDatabaseUrl.to_string(),
        })
}

/// Opens the store and brings its schema up to date.
///
/// # Errors
///
/// Returns [`CliError::Configuration`] for a blank URL and [`CliError::Io`]
/// when the database cannot be opened or migrated.
pub fn open_migrated_store(
    database_url: &str,
    telemetry: &dyn TelemetrySink,
) -> Result<SqliteStore, CliError> {
    let store = SqliteStore::open(database_url).map_err(|error| map_persistence_error(&error))?;
    store
        .migrate(telemetry)
        .map_err(|error| map_persistence_error(&error))?;
    Ok(store)
}

/// Maps a persistence error to a CLI error.
///
/// Configuration-related errors (blank URL) become [`CliError::Configuration`],
/// while runtime errors (connection, migration, query failures) become
/// [`CliError::Io`].
pub fn map_persistence_error(error: &PersistenceError) -> CliError {
    if is_configuration_error(error) {
        CliError::Configuration {
            message: error.to_string(),
        }
    } else {
        CliError::Io {
            message: error.to_string(),
        }
    }
}

/// Returns true if the persistence error is a configuration problem.
const fn is_configuration_error(error: &PersistenceError) -> bool {
    matches!(error, PersistenceError::BlankDatabaseUrl)
}
