//! Persistence contract used by the webhook processor and the client.

use super::PersistenceError;
use super::records::{
    PullRequestRecord, PullRequestUpdate, RepositoryRecord, ReviewFilter, ReviewRecord,
    WriteOutcome,
};
use crate::github::models::ReviewState;

/// Create, update, and upsert operations over persisted GitHub state.
///
/// Every method issues a single statement; callers never rely on
/// multi-statement transactions.
#[cfg_attr(test, mockall::automock)]
pub trait Store: Send + Sync {
    /// Inserts a repository unless one with the same `full_name` exists.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn create_repository(&self, record: &RepositoryRecord)
    -> Result<WriteOutcome, PersistenceError>;

    /// Sets the `private` flag; returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn update_repository_visibility(
        &self,
        full_name: &str,
        private: bool,
    ) -> Result<usize, PersistenceError>;

    /// Deletes by `full_name`; returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn delete_repository(&self, full_name: &str) -> Result<usize, PersistenceError>;

    /// Inserts or replaces the repository keyed by `full_name`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn upsert_repository(&self, record: &RepositoryRecord) -> Result<(), PersistenceError>;

    /// Inserts a pull request unless `(repository_id, number)` exists.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn create_pull_request(
        &self,
        record: &PullRequestRecord,
    ) -> Result<WriteOutcome, PersistenceError>;

    /// Applies a partial update; returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn update_pull_request(
        &self,
        repository_id: u64,
        number: u64,
        update: &PullRequestUpdate,
    ) -> Result<usize, PersistenceError>;

    /// Inserts or replaces the pull request keyed by `(repository_id, number)`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn upsert_pull_request(&self, record: &PullRequestRecord) -> Result<(), PersistenceError>;

    /// Inserts a review unless its `platform_id` was already stored.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn create_review(&self, record: &ReviewRecord) -> Result<WriteOutcome, PersistenceError>;

    /// Sets `state` on every review matching `filter`; returns the number of
    /// rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn update_many_reviews(
        &self,
        filter: &ReviewFilter,
        state: ReviewState,
    ) -> Result<usize, PersistenceError>;

    /// Releases the underlying connection. Calling it twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::DisconnectFailed`] when the connection
    /// cannot be released cleanly.
    fn disconnect(&self) -> Result<(), PersistenceError>;
}
