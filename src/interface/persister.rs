use crate::{IssuePrSample, RepoRecord, StoreError, TrendSample, TrendingRepository, UpsertOutcome};

/// A trait for persisting repository identities and their popularity time series.
///
/// Every write is its own unit of work: it either commits fully or fails with a
/// [`StoreError`] and leaves nothing behind.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RepositoryPersister: Sync + Send {
    /// Inserts the identity row of the repository, or updates its mutable fields
    /// if the `repo_id` is already known.
    ///
    /// `created_at` and `collected_at` of an existing row are never rewritten.
    async fn upsert_repo(&self, record: &RepoRecord) -> Result<UpsertOutcome, StoreError>;

    /// Appends a stars/forks sample. Fails with [`StoreError::Integrity`] if the
    /// repository has no identity row.
    async fn append_trend(&self, sample: &TrendSample) -> Result<(), StoreError>;

    /// Appends an issues/PRs sample. Fails with [`StoreError::Integrity`] if the
    /// repository has no identity row.
    async fn append_issue_pr_counts(&self, sample: &IssuePrSample) -> Result<(), StoreError>;

    /// Ranks repositories by the maximum stars sampled within the last `window_days` days.
    ///
    /// Ties are broken by `full_name` ascending.
    async fn top_trending(
        &self,
        window_days: u32,
        limit: u32,
    ) -> Result<Vec<TrendingRepository>, StoreError>;

    /// Closes the underlying connections.
    async fn close(&self);
}
