use std::fmt::Display;

use thiserror::Error;

/// The standard result type used throughout the application.
pub type StdResult<T> = Result<T, anyhow::Error>;

/// Configuration error, raised before any network or database call.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// No access token for the GitHub API
    #[error("Missing GitHub access token (set GITHUB_TOKEN or --github-token)")]
    MissingToken,

    /// No database connection parameters at all
    #[error(
        "Missing database configuration (set DATABASE_URL, DB_HOST/DB_NAME/DB_USER/DB_PASSWORD or SQLITE_PATH)"
    )]
    MissingDatabase,

    /// Some, but not all, of the database connection components
    #[error("Incomplete database configuration, missing: {}", .missing.join(", "))]
    IncompleteDatabase {
        /// Names of the missing components
        missing: Vec<&'static str>,
    },

    /// A connection string for a database that is not supported
    #[error("Unsupported database URL scheme '{scheme}' (expected postgres:// or sqlite:)")]
    UnsupportedDatabaseUrl {
        /// The scheme of the rejected URL
        scheme: String,
    },
}

/// Source error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network, authentication or rate limit failure. Retryable by the caller.
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// The queried repository does not exist
    #[error("Repository not found: {0}")]
    NotFound(String),

    /// The payload could not be parsed
    #[error("Parsing error: {0}")]
    Parse(String),
}

impl SourceError {
    /// Whether a caller may retry the failed call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

/// Store error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A write violated a referential, uniqueness or nullability constraint
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match &error {
            sqlx::Error::Database(database_error) => match database_error.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => StoreError::Integrity(database_error.to_string()),
                _ => StoreError::Database(database_error.to_string()),
            },
            _ => StoreError::Database(error.to_string()),
        }
    }
}

/// The step of the collection pipeline that failed for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStep {
    /// Fetching the repository snapshot
    Fetch,
    /// Writing the identity row
    UpsertRepo,
    /// Appending the stars/forks sample
    AppendTrend,
    /// Appending the issues/PRs sample
    AppendIssuesPrs,
}

impl Display for CollectStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectStep::Fetch => write!(f, "fetch"),
            CollectStep::UpsertRepo => write!(f, "upsert_repo"),
            CollectStep::AppendTrend => write!(f, "append_trend"),
            CollectStep::AppendIssuesPrs => write!(f, "append_issue_pr_counts"),
        }
    }
}

/// A failure of one candidate during a collection run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    /// The source failed for this candidate
    #[error("{step} failed: {source}")]
    Source {
        /// The failed step
        step: CollectStep,
        /// The underlying error
        source: SourceError,
    },

    /// The store failed for this candidate
    #[error("{step} failed: {source}")]
    Store {
        /// The failed step
        step: CollectStep,
        /// The underlying error
        source: StoreError,
    },
}

impl CollectError {
    /// Retrieves the failed step.
    pub fn step(&self) -> CollectStep {
        match self {
            CollectError::Source { step, .. } | CollectError::Store { step, .. } => *step,
        }
    }
}
