use std::str::FromStr;

use chrono::Utc;
use log::{debug, info};
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};

use super::persister_rows::TrendingRow;
use crate::{
    IssuePrSample, RepoRecord, RepositoryPersister, StdResult, StoreError, TrendSample,
    TrendingRepository, UpsertOutcome, trailing_window_start,
};

const SCHEMA: [&str; 5] = [
    r#"
CREATE TABLE IF NOT EXISTS repositories (
    id BIGSERIAL PRIMARY KEY,
    repo_id BIGINT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    full_name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    language TEXT NOT NULL DEFAULT 'Unknown',
    stars BIGINT NOT NULL,
    forks BIGINT NOT NULL,
    owner TEXT NOT NULL,
    owner_url TEXT NOT NULL,
    html_url TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    collected_at TIMESTAMPTZ NOT NULL
)
    "#,
    r#"
CREATE TABLE IF NOT EXISTS trends (
    id BIGSERIAL PRIMARY KEY,
    repo_id BIGINT NOT NULL REFERENCES repositories (repo_id),
    stars BIGINT NOT NULL,
    forks BIGINT NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL
)
    "#,
    "CREATE INDEX IF NOT EXISTS idx_trends_repo_recorded ON trends (repo_id, recorded_at)",
    r#"
CREATE TABLE IF NOT EXISTS issues_prs (
    id BIGSERIAL PRIMARY KEY,
    repo_id BIGINT NOT NULL REFERENCES repositories (repo_id),
    open_issues BIGINT NOT NULL,
    closed_issues BIGINT NOT NULL,
    open_prs BIGINT NOT NULL,
    closed_prs BIGINT NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL
)
    "#,
    "CREATE INDEX IF NOT EXISTS idx_issues_prs_repo_recorded ON issues_prs (repo_id, recorded_at)",
];

/// A persister that stores repository metadata in a PostgreSQL database.
pub struct PostgresSqlPersister {
    pool: PgPool,
}

impl PostgresSqlPersister {
    /// Creates a new `PostgresSqlPersister` instance from a connection string.
    pub async fn try_new(connection_string: &str) -> StdResult<Self> {
        Self::try_new_with_options(PgConnectOptions::from_str(connection_string)?).await
    }

    /// Creates a new `PostgresSqlPersister` instance and ensures the schema exists.
    pub async fn try_new_with_options(options: PgConnectOptions) -> StdResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        debug!("PostgreSQL schema ready");

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl RepositoryPersister for PostgresSqlPersister {
    async fn upsert_repo(&self, record: &RepoRecord) -> Result<UpsertOutcome, StoreError> {
        let mut transaction = self.pool.begin().await?;
        let (inserted,): (bool,) = sqlx::query_as(
            r#"
INSERT INTO repositories (repo_id, name, full_name, description, language, stars, forks, owner, owner_url, html_url, created_at, updated_at, collected_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
ON CONFLICT (repo_id) DO UPDATE SET
    name = EXCLUDED.name,
    full_name = EXCLUDED.full_name,
    description = EXCLUDED.description,
    language = EXCLUDED.language,
    stars = EXCLUDED.stars,
    forks = EXCLUDED.forks,
    owner = EXCLUDED.owner,
    owner_url = EXCLUDED.owner_url,
    html_url = EXCLUDED.html_url,
    updated_at = EXCLUDED.updated_at
RETURNING xmax = 0 AS inserted
            "#,
        )
        .bind(*record.repo_id as i64)
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
        .fetch_one(&mut *transaction)
        .await?;
        transaction.commit().await?;

        if inserted {
            info!("Inserted {record}");
            Ok(UpsertOutcome::Inserted)
        } else {
            info!("Updated {record}");
            Ok(UpsertOutcome::Updated)
        }
    }

    async fn append_trend(&self, sample: &TrendSample) -> Result<(), StoreError> {
        let mut transaction = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO trends (repo_id, stars, forks, recorded_at) VALUES ($1, $2, $3, $4)",
        )
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
VALUES ($1, $2, $3, $4, $5, $6)
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
WHERE t.recorded_at >= $1
GROUP BY r.repo_id, r.full_name, r.description, r.language, r.collected_at
ORDER BY max_stars DESC, r.full_name ASC
LIMIT $2
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
