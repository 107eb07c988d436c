use super::{FetcherRateLimit, RepoRecord};

/// One page of search results and the API budget left after it.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    /// Retrieved repositories
    pub(crate) repositories: Vec<RepoRecord>,

    /// The API rate limit information
    pub(crate) rate_limit: FetcherRateLimit,

    /// The cursor of the next page, if any
    pub(crate) next_cursor: Option<String>,
}

impl Response {
    /// Creates a new `Response` instance with the given repositories.
    pub fn new(
        repositories: Vec<RepoRecord>,
        rate_limit: FetcherRateLimit,
        next_cursor: Option<String>,
    ) -> Self {
        Self {
            repositories,
            rate_limit,
            next_cursor,
        }
    }

    /// Retrieves the list of repositories.
    pub fn repositories(&self) -> &[RepoRecord] {
        &self.repositories
    }

    /// Retrieves the API rate limit information.
    pub fn rate_limit(&self) -> &FetcherRateLimit {
        &self.rate_limit
    }

    /// Retrieves the cursor of the next page.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }
}
