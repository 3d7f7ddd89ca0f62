//! `SQLite` implementation of [`Store`].
//!
//! Statements are raw SQL with bound parameters. Inserts that must tolerate
//! webhook redelivery use `ON CONFLICT DO NOTHING` and report
//! [`WriteOutcome::AlreadyExists`] when no row was written.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use diesel::OptionalExtension;
use diesel::QueryableByName;
use diesel::RunQueryDsl;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Bool, Nullable, Text};
use diesel::sqlite::SqliteConnection;

use super::PersistenceError;
use super::migrator::{SchemaVersion, establish, run_migrations};
use super::records::{
    PullRequestRecord, PullRequestUpdate, RepositoryRecord, ReviewFilter, ReviewRecord,
    WriteOutcome,
};
use super::store::Store;
use crate::github::models::{PullRequestState, ReviewState};
use crate::telemetry::TelemetrySink;

/// Diesel-backed store holding one `SQLite` connection.
pub struct SqliteStore {
    connection: Mutex<Option<SqliteConnection>>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SqliteStore")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl SqliteStore {
    /// Opens `database_url` with foreign keys enabled.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the URL is blank or the connection
    /// fails.
    pub fn open(database_url: &str) -> Result<Self, PersistenceError> {
        Ok(Self {
            connection: Mutex::new(Some(establish(database_url)?)),
        })
    }

    /// Runs pending migrations on this store's connection.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when migrations fail.
    pub fn migrate(&self, telemetry: &dyn TelemetrySink) -> Result<SchemaVersion, PersistenceError> {
        self.with_connection(|connection| run_migrations(connection, telemetry))
    }

    /// Returns true until [`Store::disconnect`] is called.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Looks up a repository by `full_name`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::QueryFailed`] when the query fails.
    pub fn find_repository(
        &self,
        full_name: &str,
    ) -> Result<Option<RepositoryRecord>, PersistenceError> {
        #[derive(QueryableByName)]
        struct Row {
            #[diesel(sql_type = BigInt)]
            platform_id: i64,
            #[diesel(sql_type = Text)]
            name: String,
            #[diesel(sql_type = Text)]
            full_name: String,
            #[diesel(sql_type = Bool)]
            private: bool,
            #[diesel(sql_type = Text)]
            url: String,
        }

        let row: Option<Row> = self.with_connection(|connection| {
            sql_query(
                "SELECT platform_id, name, full_name, private, url \
                 FROM repositories WHERE full_name = ? LIMIT 1;",
            )
            .bind::<Text, _>(full_name)
            .get_result(connection)
            .optional()
            .map_err(|error| query_error(&error))
        })?;

        Ok(row.map(|found| RepositoryRecord {
            platform_id: from_i64(found.platform_id),
            name: found.name,
            full_name: found.full_name,
            private: found.private,
            url: found.url,
        }))
    }

    /// Looks up a pull request by `(repository_id, number)`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::QueryFailed`] when the query fails.
    pub fn find_pull_request(
        &self,
        repository_id: u64,
        number: u64,
    ) -> Result<Option<PullRequestRecord>, PersistenceError> {
        #[derive(QueryableByName)]
        struct Row {
            #[diesel(sql_type = BigInt)]
            platform_id: i64,
            #[diesel(sql_type = Text)]
            title: String,
            #[diesel(sql_type = Text)]
            status: String,
            #[diesel(sql_type = Bool)]
            draft: bool,
            #[diesel(sql_type = Bool)]
            is_ready: bool,
            #[diesel(sql_type = Text)]
            base_branch: String,
            #[diesel(sql_type = Text)]
            head_branch: String,
            #[diesel(sql_type = Nullable<BigInt>)]
            author_id: Option<i64>,
            #[diesel(sql_type = Nullable<Text>)]
            metadata: Option<String>,
        }

        let row: Option<Row> = self.with_connection(|connection| {
            sql_query(
                "SELECT platform_id, title, status, draft, is_ready, base_branch, head_branch, \
                 author_id, metadata \
                 FROM pull_requests WHERE repository_id = ? AND number = ? LIMIT 1;",
            )
            .bind::<BigInt, _>(to_i64(repository_id))
            .bind::<BigInt, _>(to_i64(number))
            .get_result(connection)
            .optional()
            .map_err(|error| query_error(&error))
        })?;

        row.map(|found| {
            Ok(PullRequestRecord {
                platform_id: from_i64(found.platform_id),
                repository_id,
                number,
                title: found.title,
                status: parse_status(&found.status)?,
                draft: found.draft,
                is_ready: found.is_ready,
                base_branch: found.base_branch,
                head_branch: found.head_branch,
                author_id: found.author_id.map(from_i64),
                metadata: found
                    .metadata
                    .and_then(|raw| serde_json::from_str(&raw).ok()),
            })
        })
        .transpose()
    }

    /// Counts stored pull requests.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::QueryFailed`] when the query fails.
    pub fn count_pull_requests(&self) -> Result<u64, PersistenceError> {
        #[derive(QueryableByName)]
        struct Row {
            #[diesel(sql_type = BigInt)]
            count: i64,
        }

        let row: Row = self.with_connection(|connection| {
            sql_query("SELECT COUNT(*) AS count FROM pull_requests;")
                .get_result(connection)
                .map_err(|error| query_error(&error))
        })?;
        Ok(from_i64(row.count))
    }

    /// Lists reviews by one reviewer on one pull request, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::QueryFailed`] when the query fails or a
    /// stored timestamp cannot be parsed.
    pub fn reviews_for(
        &self,
        pull_request_id: u64,
        reviewer_id: u64,
    ) -> Result<Vec<ReviewRecord>, PersistenceError> {
        #[derive(QueryableByName)]
        struct Row {
            #[diesel(sql_type = BigInt)]
            platform_id: i64,
            #[diesel(sql_type = Text)]
            reviewer_login: String,
            #[diesel(sql_type = Text)]
            status: String,
            #[diesel(sql_type = Text)]
            body: String,
            #[diesel(sql_type = Text)]
            submitted_at: String,
        }

        let rows: Vec<Row> = self.with_connection(|connection| {
            sql_query(
                "SELECT platform_id, reviewer_login, status, body, submitted_at \
                 FROM reviews WHERE pull_request_id = ? AND reviewer_id = ? \
                 ORDER BY submitted_at, id;",
            )
            .bind::<BigInt, _>(to_i64(pull_request_id))
            .bind::<BigInt, _>(to_i64(reviewer_id))
            .load(connection)
            .map_err(|error| query_error(&error))
        })?;

        rows.into_iter()
            .map(|row| {
                let submitted_at = DateTime::parse_from_rfc3339(&row.submitted_at)
                    .map_err(|error| PersistenceError::QueryFailed {
                        message: format!("invalid submitted_at `{}`: {error}", row.submitted_at),
                    })?
                    .with_timezone(&Utc);
                Ok(ReviewRecord {
                    platform_id: from_i64(row.platform_id),
                    pull_request_id,
                    reviewer_id,
                    reviewer_login: row.reviewer_login,
                    state: ReviewState::parse(&row.status),
                    body: row.body,
                    submitted_at,
                })
            })
            .collect()
    }

    fn with_connection<T>(
        &self,
        operation: impl FnOnce(&mut SqliteConnection) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let mut guard = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let connection = guard.as_mut().ok_or(PersistenceError::Disconnected)?;
        operation(connection)
    }

    fn execute_write(
        &self,
        statement: impl FnOnce(&mut SqliteConnection) -> diesel::QueryResult<usize>,
    ) -> Result<usize, PersistenceError> {
        self.with_connection(|connection| {
            statement(connection).map_err(|error| write_error(&error))
        })
    }
}

impl Store for SqliteStore {
    fn create_repository(
        &self,
        record: &RepositoryRecord,
    ) -> Result<WriteOutcome, PersistenceError> {
        let inserted = self.execute_write(|connection| {
            sql_query(
                "INSERT INTO repositories (platform_id, name, full_name, private, url) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT DO NOTHING;",
            )
            .bind::<BigInt, _>(to_i64(record.platform_id))
            .bind::<Text, _>(&record.name)
            .bind::<Text, _>(&record.full_name)
            .bind::<Bool, _>(record.private)
            .bind::<Text, _>(&record.url)
            .execute(connection)
        })?;
        Ok(write_outcome(inserted))
    }

    fn update_repository_visibility(
        &self,
        full_name: &str,
        private: bool,
    ) -> Result<usize, PersistenceError> {
        self.execute_write(|connection| {
            sql_query(
                "UPDATE repositories SET private = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE full_name = ?;",
            )
            .bind::<Bool, _>(private)
            .bind::<Text, _>(full_name)
            .execute(connection)
        })
    }

    fn delete_repository(&self, full_name: &str) -> Result<usize, PersistenceError> {
        self.execute_write(|connection| {
            sql_query("DELETE FROM repositories WHERE full_name = ?;")
                .bind::<Text, _>(full_name)
                .execute(connection)
        })
    }

    fn upsert_repository(&self, record: &RepositoryRecord) -> Result<(), PersistenceError> {
        self.execute_write(|connection| {
            sql_query(
                "INSERT INTO repositories (platform_id, name, full_name, private, url) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT(full_name) DO UPDATE SET \
                   platform_id = excluded.platform_id, \
                   name = excluded.name, \
                   private = excluded.private, \
                   url = excluded.url, \
                   updated_at = CURRENT_TIMESTAMP;",
            )
            .bind::<BigInt, _>(to_i64(record.platform_id))
            .bind::<Text, _>(&record.name)
            .bind::<Text, _>(&record.full_name)
            .bind::<Bool, _>(record.private)
            .bind::<Text, _>(&record.url)
            .execute(connection)
        })
        .map(drop)
    }

    fn create_pull_request(
        &self,
        record: &PullRequestRecord,
    ) -> Result<WriteOutcome, PersistenceError> {
        let metadata = metadata_text(record.metadata.as_ref());
        let inserted = self.execute_write(|connection| {
            sql_query(
                "INSERT INTO pull_requests \
                 (platform_id, repository_id, number, title, status, draft, is_ready, \
                  base_branch, head_branch, author_id, metadata) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(repository_id, number) DO NOTHING;",
            )
            .bind::<BigInt, _>(to_i64(record.platform_id))
            .bind::<BigInt, _>(to_i64(record.repository_id))
            .bind::<BigInt, _>(to_i64(record.number))
            .bind::<Text, _>(&record.title)
            .bind::<Text, _>(record.status.as_str())
            .bind::<Bool, _>(record.draft)
            .bind::<Bool, _>(record.is_ready)
            .bind::<Text, _>(&record.base_branch)
            .bind::<Text, _>(&record.head_branch)
            .bind::<Nullable<BigInt>, _>(record.author_id.map(to_i64))
            .bind::<Nullable<Text>, _>(metadata.as_deref())
            .execute(connection)
        })?;
        Ok(write_outcome(inserted))
    }

    fn update_pull_request(
        &self,
        repository_id: u64,
        number: u64,
        update: &PullRequestUpdate,
    ) -> Result<usize, PersistenceError> {
        let metadata = metadata_text(update.metadata.as_ref());
        self.execute_write(|connection| {
            sql_query(
                "UPDATE pull_requests SET \
                   title = COALESCE(?, title), \
                   status = COALESCE(?, status), \
                   draft = COALESCE(?, draft), \
                   is_ready = COALESCE(?, is_ready), \
                   metadata = COALESCE(?, metadata), \
                   updated_at = CURRENT_TIMESTAMP \
                 WHERE repository_id = ? AND number = ?;",
            )
            .bind::<Nullable<Text>, _>(update.title.as_deref())
            .bind::<Nullable<Text>, _>(update.status.map(PullRequestState::as_str))
            .bind::<Nullable<Bool>, _>(update.draft)
            .bind::<Nullable<Bool>, _>(update.is_ready)
            .bind::<Nullable<Text>, _>(metadata.as_deref())
            .bind::<BigInt, _>(to_i64(repository_id))
            .bind::<BigInt, _>(to_i64(number))
            .execute(connection)
        })
    }

    fn upsert_pull_request(&self, record: &PullRequestRecord) -> Result<(), PersistenceError> {
        let metadata = metadata_text(record.metadata.as_ref());
        self.execute_write(|connection| {
            sql_query(
                "INSERT INTO pull_requests \
                 (platform_id, repository_id, number, title, status, draft, is_ready, \
                  base_branch, head_branch, author_id, metadata) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(repository_id, number) DO UPDATE SET \
                   platform_id = excluded.platform_id, \
                   title = excluded.title, \
                   status = excluded.status, \
                   draft = excluded.draft, \
                   is_ready = excluded.is_ready, \
                   base_branch = excluded.base_branch, \
                   head_branch = excluded.head_branch, \
                   author_id = COALESCE(excluded.author_id, author_id), \
                   metadata = COALESCE(excluded.metadata, metadata), \
                   updated_at = CURRENT_TIMESTAMP;",
            )
            .bind::<BigInt, _>(to_i64(record.platform_id))
            .bind::<BigInt, _>(to_i64(record.repository_id))
            .bind::<BigInt, _>(to_i64(record.number))
            .bind::<Text, _>(&record.title)
            .bind::<Text, _>(record.status.as_str())
            .bind::<Bool, _>(record.draft)
            .bind::<Bool, _>(record.is_ready)
            .bind::<Text, _>(&record.base_branch)
            .bind::<Text, _>(&record.head_branch)
            .bind::<Nullable<BigInt>, _>(record.author_id.map(to_i64))
            .bind::<Nullable<Text>, _>(metadata.as_deref())
            .execute(connection)
        })
        .map(drop)
    }

    fn create_review(&self, record: &ReviewRecord) -> Result<WriteOutcome, PersistenceError> {
        let submitted_at = record.submitted_at.to_rfc3339();
        let inserted = self.execute_write(|connection| {
            sql_query(
                "INSERT INTO reviews \
                 (platform_id, pull_request_id, reviewer_id, reviewer_login, status, body, \
                  submitted_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(platform_id) DO NOTHING;",
            )
            .bind::<BigInt, _>(to_i64(record.platform_id))
            .bind::<BigInt, _>(to_i64(record.pull_request_id))
            .bind::<BigInt, _>(to_i64(record.reviewer_id))
            .bind::<Text, _>(&record.reviewer_login)
            .bind::<Text, _>(record.state.as_str())
            .bind::<Text, _>(&record.body)
            .bind::<Text, _>(&submitted_at)
            .execute(connection)
        })?;
        Ok(write_outcome(inserted))
    }

    fn update_many_reviews(
        &self,
        filter: &ReviewFilter,
        state: ReviewState,
    ) -> Result<usize, PersistenceError> {
        self.execute_write(|connection| {
            sql_query(
                "UPDATE reviews SET status = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE pull_request_id = ? AND reviewer_id = ? \
                   AND (? IS NULL OR status <> ?);",
            )
            .bind::<Text, _>(state.as_str())
            .bind::<BigInt, _>(to_i64(filter.pull_request_id))
            .bind::<BigInt, _>(to_i64(filter.reviewer_id))
            .bind::<Nullable<Text>, _>(filter.exclude_state.map(ReviewState::as_str))
            .bind::<Nullable<Text>, _>(filter.exclude_state.map(ReviewState::as_str))
            .execute(connection)
        })
    }

    fn disconnect(&self) -> Result<(), PersistenceError> {
        let released = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(released);
        Ok(())
    }
}

fn parse_status(raw: &str) -> Result<PullRequestState, PersistenceError> {
    match raw {
        "OPEN" => Ok(PullRequestState::Open),
        "CLOSED" => Ok(PullRequestState::Closed),
        "MERGED" => Ok(PullRequestState::Merged),
        other => Err(PersistenceError::QueryFailed {
            message: format!("unknown pull request status `{other}`"),
        }),
    }
}

fn metadata_text(metadata: Option<&serde_json::Value>) -> Option<String> {
    metadata.map(serde_json::Value::to_string)
}

const fn write_outcome(inserted: usize) -> WriteOutcome {
    if inserted == 0 {
        WriteOutcome::AlreadyExists
    } else {
        WriteOutcome::Created
    }
}

fn to_i64(value: u64) -> i64 {
    // GitHub ids fit in i64; saturate rather than wrap if one ever does not.
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_i64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn query_error(error: &diesel::result::Error) -> PersistenceError {
    PersistenceError::QueryFailed {
        message: error.to_string(),
    }
}

fn write_error(error: &diesel::result::Error) -> PersistenceError {
    PersistenceError::WriteFailed {
        message: error.to_string(),
    }
}
