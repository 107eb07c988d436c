use crate::{RepoRecord, SourceError};

/// A trait for fetching repository snapshots from the platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RepositoryFetcher: Sync + Send {
    /// Fetches at most `limit` repositories created within the last `days` days, most starred first.
    ///
    /// A query without matches yields an empty list, not an error.
    async fn search_trending(&self, days: u32, limit: u32) -> Result<Vec<RepoRecord>, SourceError>;

    /// Fetches the current snapshot of the repository named `owner/name`.
    async fn get_repo(&self, full_name: &str) -> Result<RepoRecord, SourceError>;
}
