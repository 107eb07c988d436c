use std::{fmt::Display, ops::Deref};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CollectError;

/// The stable identifier assigned to a repository by the platform.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryId(pub u64);

impl Deref for RepositoryId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The number of stars a repository has.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StarsCounter(pub u32);

impl Deref for StarsCounter {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for StarsCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The number of forks a repository has.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ForksCounter(pub u32);

impl Deref for ForksCounter {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ForksCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issue and pull request counters of a repository.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssuePrCounts {
    /// The number of open issues.
    pub open_issues: u32,

    /// The number of closed issues.
    pub closed_issues: u32,

    /// The number of open pull requests.
    pub open_prs: u32,

    /// The number of closed or merged pull requests.
    pub closed_prs: u32,
}

/// A snapshot of a GitHub repository as seen by one collection run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RepoRecord {
    /// The platform identifier of the repository.
    pub repo_id: RepositoryId,

    /// The short name of the repository.
    pub name: String,

    /// The `owner/name` of the repository.
    pub full_name: String,

    /// The description, empty when the repository has none.
    pub description: String,

    /// The primary language, `Unknown` when the platform reports none.
    pub language: String,

    /// The login of the owner.
    pub owner: String,

    /// The profile URL of the owner.
    pub owner_url: String,

    /// The web URL of the repository.
    pub html_url: String,

    /// When the repository was created.
    pub created_at: DateTime<Utc>,

    /// When the repository was last updated.
    pub updated_at: DateTime<Utc>,

    /// When this snapshot was captured locally.
    pub collected_at: DateTime<Utc>,

    /// The number of stars.
    pub stars: StarsCounter,

    /// The number of forks.
    pub forks: ForksCounter,

    /// Issue and pull request counters.
    pub issues_prs: IssuePrCounts,
}

impl RepoRecord {
    /// The description used when the platform reports none.
    pub const DEFAULT_DESCRIPTION: &'static str = "";

    /// The language used when the platform reports none.
    pub const DEFAULT_LANGUAGE: &'static str = "Unknown";

    /// Builds the stars/forks sample of this snapshot.
    pub fn trend_sample(&self) -> TrendSample {
        TrendSample {
            repo_id: self.repo_id,
            stars: self.stars,
            forks: self.forks,
            recorded_at: self.collected_at,
        }
    }

    /// Builds the issues/PRs sample of this snapshot.
    pub fn issue_pr_sample(&self) -> IssuePrSample {
        IssuePrSample {
            repo_id: self.repo_id,
            counts: self.issues_prs,
            recorded_at: self.collected_at,
        }
    }

    /// Creates a dummy `RepoRecord` for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy(repo_id: u64, full_name: &str, stars: u32) -> Self {
        let (owner, name) = full_name.split_once('/').unwrap_or(("owner", full_name));
        let created_at = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        Self {
            repo_id: RepositoryId(repo_id),
            name: name.to_string(),
            full_name: full_name.to_string(),
            description: format!("Description of {full_name}"),
            language: "Rust".to_string(),
            owner: owner.to_string(),
            owner_url: format!("https://github.com/{owner}"),
            html_url: format!("https://github.com/{full_name}"),
            created_at,
            updated_at: created_at,
            collected_at: Utc::now(),
            stars: StarsCounter(stars),
            forks: ForksCounter(stars / 10),
            issues_prs: IssuePrCounts {
                open_issues: 3,
                closed_issues: 2,
                open_prs: 1,
                closed_prs: 4,
            },
        }
    }
}

impl Display for RepoRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Repository: {} (id={}), Language: {}, Stars: {}, Forks: {}",
            self.full_name, self.repo_id, self.language, self.stars, self.forks
        )
    }
}

/// An immutable stars/forks measurement of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendSample {
    /// The measured repository.
    pub repo_id: RepositoryId,
    /// The number of stars.
    pub stars: StarsCounter,
    /// The number of forks.
    pub forks: ForksCounter,
    /// When the measurement was taken.
    pub recorded_at: DateTime<Utc>,
}

/// An immutable issues/PRs measurement of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuePrSample {
    /// The measured repository.
    pub repo_id: RepositoryId,
    /// The counters.
    pub counts: IssuePrCounts,
    /// When the measurement was taken.
    pub recorded_at: DateTime<Utc>,
}

/// What an upsert did to the identity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting of the repository
    Inserted,
    /// The repository was already known
    Updated,
}

/// One row of the trending leaderboard.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TrendingRepository {
    /// The `owner/name` of the repository.
    pub full_name: String,
    /// The current description.
    pub description: String,
    /// The current primary language.
    pub language: String,
    /// The maximum stars observed in the window.
    pub max_stars: StarsCounter,
    /// The maximum forks observed in the window.
    pub max_forks: ForksCounter,
    /// When the repository was first collected.
    pub collected_at: DateTime<Utc>,
    /// The latest sample inside the window.
    pub last_recorded_at: DateTime<Utc>,
}

impl Display for TrendingRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: stars={}, forks={}, language={}",
            self.full_name, self.max_stars, self.max_forks, self.language
        )
    }
}

/// A fetcher API rate limit
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FetcherRateLimit {
    /// The maximum number of points that can be spent in a given time period.
    pub limit: i32,
    /// The cost of the current request.
    pub cost: i32,
    /// The remaining number of points in the current time period.
    pub remaining: i32,
    /// The time at which the rate limit will reset.
    pub reset_at: String,
}

impl FetcherRateLimit {
    /// Whether the budget is spent until the next reset.
    pub fn is_exceeded(&self) -> bool {
        self.remaining <= 0
    }

    #[cfg(test)]
    /// Creates a dummy `FetcherRateLimit` instance for testing purposes.
    pub fn dummy() -> Self {
        Self {
            limit: 5000,
            cost: 1,
            remaining: 4999,
            reset_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }
}

impl Display for FetcherRateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RateLimit: calls={}/{} (+{}), reset={}",
            self.limit - self.remaining,
            self.limit,
            self.cost,
            self.reset_at
        )
    }
}

/// A candidate that could not be fully persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    /// The `owner/name` of the candidate.
    pub full_name: String,
    /// Why it failed.
    pub error: CollectError,
}

impl Display for CandidateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.full_name, self.error)
    }
}

/// Accounting of one collection run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    /// The number of candidates processed
    pub total_attempted: u32,

    /// The number of candidates whose identity row and samples were all written
    pub total_succeeded: u32,

    /// The number of identity rows created by the run
    pub total_inserted: u32,

    /// The number of identity rows updated by the run
    pub total_updated: u32,

    /// The candidates that failed, in processing order
    pub failures: Vec<CandidateFailure>,
}

impl CollectionSummary {
    /// Retrieves the number of failed candidates.
    pub fn total_failed(&self) -> u32 {
        self.failures.len() as u32
    }

    /// A run succeeds when strictly more than half of the attempted candidates were persisted.
    pub fn is_successful(&self) -> bool {
        self.total_succeeded > 0 && self.total_succeeded * 2 > self.total_attempted
    }
}

impl Display for CollectionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Repositories: attempted={}, succeeded={}, failed={}, inserted={}, updated={}",
            self.total_attempted,
            self.total_succeeded,
            self.total_failed(),
            self.total_inserted,
            self.total_updated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectStep, SourceError};

    #[test]
    fn samples_are_taken_at_collection_time() {
        let record = RepoRecord::dummy(1, "a/b", 10);

        let trend = record.trend_sample();
        let issues_prs = record.issue_pr_sample();

        assert_eq!(
            TrendSample {
                repo_id: RepositoryId(1),
                stars: StarsCounter(10),
                forks: ForksCounter(1),
                recorded_at: record.collected_at,
            },
            trend
        );
        assert_eq!(record.issues_prs, issues_prs.counts);
        assert_eq!(record.collected_at, issues_prs.recorded_at);
    }

    #[test]
    fn rate_limit_exceeded_when_nothing_remains() {
        let mut rate_limit = FetcherRateLimit::dummy();
        assert!(!rate_limit.is_exceeded());

        rate_limit.remaining = 0;

        assert!(rate_limit.is_exceeded());
    }

    mod collection_summary {
        use super::*;

        fn summary(total_attempted: u32, total_succeeded: u32) -> CollectionSummary {
            CollectionSummary {
                total_attempted,
                total_succeeded,
                failures: (total_succeeded..total_attempted)
                    .map(|i| CandidateFailure {
                        full_name: format!("org/repo-{i}"),
                        error: CollectError::Source {
                            step: CollectStep::Fetch,
                            source: SourceError::NotFound(format!("org/repo-{i}")),
                        },
                    })
                    .collect(),
                ..CollectionSummary::default()
            }
        }

        #[test]
        fn successful_when_all_persisted() {
            assert!(summary(10, 10).is_successful());
        }

        #[test]
        fn successful_when_majority_persisted() {
            assert!(summary(10, 6).is_successful());
            assert_eq!(4, summary(10, 6).total_failed());
        }

        #[test]
        fn unsuccessful_when_half_or_less_persisted() {
            assert!(!summary(10, 5).is_successful());
            assert!(!summary(10, 0).is_successful());
        }

        #[test]
        fn unsuccessful_when_nothing_attempted() {
            assert!(!summary(0, 0).is_successful());
        }
    }
}
