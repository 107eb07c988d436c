use std::{path::Path, str::FromStr};

use chrono::Utc;
use log::{debug, info};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use super::persister_rows::TrendingRow;
use crate::{
    IssuePrSample, RepoRecord, RepositoryPersister, StdResult, StoreError, TrendSample,
    TrendingRepository, UpsertOutcome, trailing_window_start,
};

const SCHEMA: [&str; 5] = [
    r#"
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    full_name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    language TEXT NOT NULL DEFAULT 'Unknown',
    stars INTEGER NOT NULL,
    forks INTEGER NOT NULL,
    owner TEXT NOT NULL,
    owner_url TEXT NOT NULL,
    html_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    collected_at TEXT NOT NULL
)
    "#,
    r#"
CREATE TABLE IF NOT EXISTS trends (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id INTEGER NOT NULL REFERENCES repositories (repo_id),
    stars INTEGER NOT NULL,
    forks INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
)
    "#,
    "CREATE INDEX IF NOT EXISTS idx_trends_repo_recorded ON trends (repo_id, recorded_at)",
    r#"
CREATE TABLE IF NOT EXISTS issues_prs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id INTEGER NOT NULL REFERENCES repositories (repo_id),
    open_issues INTEGER NOT NULL,
    closed_issues INTEGER NOT NULL,
    open_prs INTEGER NOT NULL,
    closed_prs INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
)
    "#,
    "CREATE INDEX IF NOT EXISTS idx_issues_prs_repo_recorded ON issues_prs (repo_id, recorded_at)",
];

/// A persister that stores repository metadata in an embedded SQLite database.
pub struct SqlitePersister {
    pool: SqlitePool,
}

impl SqlitePersister {
    /// Opens (and creates if missing) the SQLite database file at the given path.
    pub async fn try_new(path: &Path) -> StdResult<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        Self::connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        )
        .await
    }

    /// Opens the SQLite database of a `sqlite:` connection string.
    pub async fn try_new_with_url(url: &str) -> StdResult<Self> {
        Self::connect_with(SqliteConnectOptions::from_str(url)?.create_if_missing(true)).await
    }

    /// Opens a fresh in-memory database.
    pub async fn try_new_in_memory() -> StdResult<Self> {
        Self::connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> StdResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.foreign_keys(true))
            .await?;
        create_schema(&pool).await?;

        Ok(Self { pool })
    }
}

async fn create_schema(pool: &SqlitePool) -> StdResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!("SQLite schema ready");

    Ok(())
}

#[async_trait::async_trait]
impl RepositoryPersister for SqlitePersister {
    async fn upsert_repo(&self, record: &RepoRecord) -> Result<UpsertOutcome, StoreError> {
        let repo_id = *record.repo_id as i64;
        let mut transaction = self.pool.begin().await?;
        let (known,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM repositories WHERE repo_id = ?")
                .bind(repo_id)
                .fetch_one(&mut *transaction)
                .await?;
        sqlx::query(
            r#"
INSERT INTO repositories (repo_id, name, full_name, description, language, stars, forks, owner, owner_url, html_url, created_at, updated_at, collected_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (repo_id) DO UPDATE SET
    name = excluded.name,
    full_name = excluded.full_name,
    description = excluded.description,
    language = excluded.language,
    stars = excluded.stars,
    forks = excluded.forks,
    owner = excluded.owner,
    owner_url = excluded.owner_url,
    html_url = excluded.html_url,
    updated_at = excluded.updated_at
            "#,
        )
        .bind(repo_id)
        .bind(&record.name)
        .bind(&record.full_name)
        .bind(&record.description)
        .bind(&record.language)
        .bind(*record.stars as i64)
        .bind(*record.forks as i64)
        .bind(&record.owner)
        .bind(&record.owner_url)
        .bind(&record.html_url)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.collected_at)
        .execute(&mut *transaction)
        .await?;
        transaction.commit().await?;

        if known > 0 {
            info!("Updated {record}");
            Ok(UpsertOutcome::Updated)
        } else {
            info!("Inserted {record}");
            Ok(UpsertOutcome::Inserted)
        }
    }

    async fn append_trend(&self, sample: &TrendSample) -> Result<(), StoreError> {
        let mut transaction = self.pool.begin().await?;
        sqlx::query("INSERT INTO trends (repo_id, stars, forks, recorded_at) VALUES (?, ?, ?, ?)")
            .bind(*sample.repo_id as i64)
            .bind(*sample.stars as i64)
            .bind(*sample.forks as i64)
            .bind(sample.recorded_at)
            .execute(&mut *transaction)
            .await?;
        transaction.commit().await?;
        debug!("Appended trend sample for repository {}", sample.repo_id);

        Ok(())
    }

    async fn append_issue_pr_counts(&self, sample: &IssuePrSample) -> Result<(), StoreError> {
        let mut transaction = self.pool.begin().await?;
        sqlx::query(
            r#"
INSERT INTO issues_prs (repo_id, open_issues, closed_issues, open_prs, closed_prs, recorded_at)
VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(*sample.repo_id as i64)
        .bind(sample.counts.open_issues as i64)
        .bind(sample.counts.closed_issues as i64)
        .bind(sample.counts.open_prs as i64)
        .bind(sample.counts.closed_prs as i64)
        .bind(sample.recorded_at)
        .execute(&mut *transaction)
        .await?;
        transaction.commit().await?;
        debug!("Appended issues/PRs sample for repository {}", sample.repo_id);

        Ok(())
    }

    async fn top_trending(
        &self,
        window_days: u32,
        limit: u32,
    ) -> Result<Vec<TrendingRepository>, StoreError> {
        let window_start = trailing_window_start(Utc::now(), window_days);
        let rows: Vec<TrendingRow> = sqlx::query_as(
            r#"
SELECT
    r.full_name AS full_name,
    r.description AS description,
    r.language AS language,
    MAX(t.stars) AS max_stars,
    MAX(t.forks) AS max_forks,
    r.collected_at AS collected_at,
    MAX(t.recorded_at) AS last_recorded_at
FROM trends t
INNER JOIN repositories r ON r.repo_id = t.repo_id
WHERE t.recorded_at >= ?
GROUP BY r.repo_id, r.full_name, r.description, r.language, r.collected_at
ORDER BY max_stars DESC, r.full_name ASC
LIMIT ?
            "#,
        )
        .bind(window_start)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::{ForksCounter, IssuePrCounts, RepositoryId, StarsCounter};

    async fn persister() -> SqlitePersister {
        SqlitePersister::try_new_in_memory().await.unwrap()
    }

    async fn count_rows(persister: &SqlitePersister, table: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&persister.pool)
            .await
            .unwrap();

        count
    }

    fn trend(repo_id: u64, stars: u32, recorded_at: DateTime<Utc>) -> TrendSample {
        TrendSample {
            repo_id: RepositoryId(repo_id),
            stars: StarsCounter(stars),
            forks: ForksCounter(stars / 10),
            recorded_at,
        }
    }

    #[tokio::test]
    async fn creates_all_tables() {
        let persister = persister().await;

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&persister.pool)
                .await
                .unwrap();
        let tables = tables.into_iter().map(|(name,)| name).collect::<Vec<_>>();

        for table in ["repositories", "trends", "issues_prs"] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let persister = persister().await;

        create_schema(&persister.pool).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_row_with_latest_stars() {
        let persister = persister().await;
        let mut record = RepoRecord::dummy(12345, "user/test-repo", 100);

        let first = persister.upsert_repo(&record).await.unwrap();
        record.stars = StarsCounter(150);
        record.description = "Updated description".to_string();
        let second = persister.upsert_repo(&record).await.unwrap();

        assert_eq!(UpsertOutcome::Inserted, first);
        assert_eq!(UpsertOutcome::Updated, second);
        assert_eq!(1, count_rows(&persister, "repositories").await);
        let (stars, description): (i64, String) =
            sqlx::query_as("SELECT stars, description FROM repositories WHERE repo_id = ?")
                .bind(12345_i64)
                .fetch_one(&persister.pool)
                .await
                .unwrap();
        assert_eq!(150, stars);
        assert_eq!("Updated description", description);
    }

    #[tokio::test]
    async fn upsert_never_rewrites_created_at_and_collected_at() {
        let persister = persister().await;
        let original = RepoRecord::dummy(1, "a/b", 10);
        persister.upsert_repo(&original).await.unwrap();

        let mut resighted = original.clone();
        resighted.created_at = original.created_at + Duration::days(1);
        resighted.updated_at = original.updated_at + Duration::days(2);
        resighted.collected_at = original.collected_at + Duration::hours(6);
        persister.upsert_repo(&resighted).await.unwrap();

        let (created_at, updated_at, collected_at): (DateTime<Utc>, DateTime<Utc>, DateTime<Utc>) =
            sqlx::query_as(
                "SELECT created_at, updated_at, collected_at FROM repositories WHERE repo_id = ?",
            )
            .bind(1_i64)
            .fetch_one(&persister.pool)
            .await
            .unwrap();
        assert_eq!(original.created_at, created_at);
        assert_eq!(resighted.updated_at, updated_at);
        assert_eq!(original.collected_at, collected_at);
    }

    #[tokio::test]
    async fn upsert_with_identical_values_is_idempotent() {
        let persister = persister().await;
        let record = RepoRecord::dummy(1, "a/b", 10);

        persister.upsert_repo(&record).await.unwrap();
        persister.upsert_repo(&record).await.unwrap();

        assert_eq!(1, count_rows(&persister, "repositories").await);
    }

    #[tokio::test]
    async fn upsert_fails_when_full_name_taken_by_another_repository() {
        let persister = persister().await;
        persister
            .upsert_repo(&RepoRecord::dummy(1, "a/b", 10))
            .await
            .unwrap();

        let error = persister
            .upsert_repo(&RepoRecord::dummy(2, "a/b", 20))
            .await
            .unwrap_err();

        assert!(matches!(error, StoreError::Integrity(_)), "{error:?}");
        assert_eq!(1, count_rows(&persister, "repositories").await);
    }

    #[tokio::test]
    async fn append_trend_fails_without_identity_row() {
        let persister = persister().await;

        let error = persister
            .append_trend(&trend(404, 10, Utc::now()))
            .await
            .unwrap_err();

        assert!(matches!(error, StoreError::Integrity(_)), "{error:?}");
        assert_eq!(0, count_rows(&persister, "trends").await);
    }

    #[tokio::test]
    async fn append_issue_pr_counts_fails_without_identity_row() {
        let persister = persister().await;
        let sample = IssuePrSample {
            repo_id: RepositoryId(404),
            counts: IssuePrCounts::default(),
            recorded_at: Utc::now(),
        };

        let error = persister.append_issue_pr_counts(&sample).await.unwrap_err();

        assert!(matches!(error, StoreError::Integrity(_)), "{error:?}");
        assert_eq!(0, count_rows(&persister, "issues_prs").await);
    }

    #[tokio::test]
    async fn append_samples_after_upsert() {
        let persister = persister().await;
        let record = RepoRecord::dummy(1, "a/b", 10);
        persister.upsert_repo(&record).await.unwrap();

        persister.append_trend(&record.trend_sample()).await.unwrap();
        persister.append_trend(&record.trend_sample()).await.unwrap();
        persister
            .append_issue_pr_counts(&record.issue_pr_sample())
            .await
            .unwrap();

        assert_eq!(2, count_rows(&persister, "trends").await);
        assert_eq!(1, count_rows(&persister, "issues_prs").await);
        let (open_issues, closed_prs): (i64, i64) =
            sqlx::query_as("SELECT open_issues, closed_prs FROM issues_prs WHERE repo_id = ?")
                .bind(1_i64)
                .fetch_one(&persister.pool)
                .await
                .unwrap();
        assert_eq!(3, open_issues);
        assert_eq!(4, closed_prs);
    }

    #[tokio::test]
    async fn top_trending_without_samples_is_empty() {
        let persister = persister().await;
        persister
            .upsert_repo(&RepoRecord::dummy(1, "a/b", 10))
            .await
            .unwrap();

        let trending = persister.top_trending(7, 10).await.unwrap();

        assert!(trending.is_empty());
    }

    #[tokio::test]
    async fn top_trending_ranks_by_max_stars_in_window() {
        let persister = persister().await;
        let now = Utc::now();
        persister
            .upsert_repo(&RepoRecord::dummy(1, "a/b", 30))
            .await
            .unwrap();
        persister
            .upsert_repo(&RepoRecord::dummy(2, "c/d", 5))
            .await
            .unwrap();
        for (hours_ago, stars) in [(3, 10), (2, 50), (1, 30)] {
            persister
                .append_trend(&trend(1, stars, now - Duration::hours(hours_ago)))
                .await
                .unwrap();
        }
        for hours_ago in [2, 1] {
            persister
                .append_trend(&trend(2, 5, now - Duration::hours(hours_ago)))
                .await
                .unwrap();
        }

        let trending = persister.top_trending(7, 5).await.unwrap();

        assert_eq!(
            vec![
                ("a/b".to_string(), StarsCounter(50), ForksCounter(5)),
                ("c/d".to_string(), StarsCounter(5), ForksCounter(0)),
            ],
            trending
                .iter()
                .map(|row| (row.full_name.clone(), row.max_stars, row.max_forks))
                .collect::<Vec<_>>()
        );
        assert_eq!(now - Duration::hours(1), trending[0].last_recorded_at);
        assert_eq!("Description of a/b", trending[0].description);
        assert_eq!("Rust", trending[0].language);
    }

    #[tokio::test]
    async fn top_trending_ignores_samples_outside_window() {
        let persister = persister().await;
        let now = Utc::now();
        persister
            .upsert_repo(&RepoRecord::dummy(1, "a/b", 10))
            .await
            .unwrap();
        persister
            .upsert_repo(&RepoRecord::dummy(2, "old/only", 10))
            .await
            .unwrap();
        persister
            .append_trend(&trend(1, 1000, now - Duration::days(8)))
            .await
            .unwrap();
        persister
            .append_trend(&trend(1, 20, now - Duration::days(1)))
            .await
            .unwrap();
        persister
            .append_trend(&trend(2, 500, now - Duration::days(8)))
            .await
            .unwrap();

        let trending = persister.top_trending(7, 10).await.unwrap();

        assert_eq!(1, trending.len());
        assert_eq!("a/b", trending[0].full_name);
        assert_eq!(StarsCounter(20), trending[0].max_stars);
    }

    #[tokio::test]
    async fn top_trending_with_window_beyond_calendar_covers_all_samples() {
        let persister = persister().await;
        let now = Utc::now();
        persister
            .upsert_repo(&RepoRecord::dummy(1, "a/b", 10))
            .await
            .unwrap();
        persister
            .append_trend(&trend(1, 70, now - Duration::days(3650)))
            .await
            .unwrap();
        persister
            .append_trend(&trend(1, 10, now))
            .await
            .unwrap();

        for window_days in [100_000_000, u32::MAX] {
            let trending = persister.top_trending(window_days, 10).await.unwrap();

            assert_eq!(1, trending.len());
            assert_eq!(StarsCounter(70), trending[0].max_stars);
        }
    }

    #[tokio::test]
    async fn top_trending_respects_limit_and_breaks_ties_by_full_name() {
        let persister = persister().await;
        let now = Utc::now();
        for (repo_id, full_name) in [(1, "zeta/repo"), (2, "alpha/repo"), (3, "mid/repo")] {
            persister
                .upsert_repo(&RepoRecord::dummy(repo_id, full_name, 42))
                .await
                .unwrap();
            persister
                .append_trend(&trend(repo_id, 42, now - Duration::minutes(5)))
                .await
                .unwrap();
        }

        let trending = persister.top_trending(7, 2).await.unwrap();

        assert_eq!(
            vec!["alpha/repo", "mid/repo"],
            trending
                .iter()
                .map(|row| row.full_name.as_str())
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn top_trending_reflects_current_identity_metadata() {
        let persister = persister().await;
        let mut record = RepoRecord::dummy(1, "a/b", 10);
        persister.upsert_repo(&record).await.unwrap();
        persister.append_trend(&record.trend_sample()).await.unwrap();

        record.language = "Zig".to_string();
        persister.upsert_repo(&record).await.unwrap();
        let trending = persister.top_trending(7, 10).await.unwrap();

        assert_eq!("Zig", trending[0].language);
        assert_eq!(record.collected_at, trending[0].collected_at);
    }
}
