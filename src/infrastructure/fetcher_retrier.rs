use std::{future::Future, sync::Arc, time::Duration};

use log::warn;
use tokio::time::sleep;

use crate::{RepoRecord, RepositoryFetcher, SourceError};

/// A struct that retries a RepositoryFetcher a specified number of times in case of failure with exponential backoff strategy.
///
/// Only [`SourceError::Unavailable`] failures are retried.
pub struct FetcherRetrier {
    /// The fetcher to be retried.
    fetcher: Arc<dyn RepositoryFetcher>,

    /// The maximum number of attempts for a request.
    max_retries: u32,

    /// The base delay for exponential backoff.
    base_delay: Duration,
}

impl FetcherRetrier {
    /// Creates a new `FetcherRetrier` instance with the given maximum number of retries.
    pub fn new(fetcher: Arc<dyn RepositoryFetcher>, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            fetcher,
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    fn calculate_exponential_backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * (2u32.pow(attempt.min(31)))
    }

    async fn retry<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, SourceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempts = 0;

        loop {
            match call().await {
                Ok(res) => return Ok(res),
                Err(e) if e.is_retryable() => {
                    warn!("{operation} attempt #{} failed: {}", attempts + 1, e);
                    attempts += 1;
                    if attempts >= self.max_retries {
                        return Err(SourceError::Unavailable(format!(
                            "Failed after {attempts} attempts: {e}"
                        )));
                    }
                    sleep(self.calculate_exponential_backoff_delay(attempts)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait::async_trait]
impl RepositoryFetcher for FetcherRetrier {
    async fn search_trending(&self, days: u32, limit: u32) -> Result<Vec<RepoRecord>, SourceError> {
        self.retry("Search", || self.fetcher.search_trending(days, limit))
            .await
    }

    async fn get_repo(&self, full_name: &str) -> Result<RepoRecord, SourceError> {
        self.retry("Get repository", || self.fetcher.get_repo(full_name))
            .await
    }
}
