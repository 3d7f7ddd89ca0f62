//! Local persistence and database migrations.
//!
//! Webhook deliveries are mirrored into a local `SQLite` database. The schema
//! is managed with Diesel migrations so the database can be created and
//! upgraded consistently across machines. Writers depend on the [`Store`]
//! trait; [`SqliteStore`] is the shipped implementation.

mod error;
mod migrator;
mod records;
mod sqlite;
mod store;

pub use error::PersistenceError;
pub use migrator::{CURRENT_SCHEMA_VERSION, MIGRATIONS, SchemaVersion, migrate_database};
pub use records::{
    PullRequestRecord, PullRequestUpdate, RepositoryRecord, ReviewFilter, ReviewRecord,
    WriteOutcome,
};
pub use sqlite::SqliteStore;
#[cfg(test)]
pub(crate) use store::MockStore;
pub use store::Store;
