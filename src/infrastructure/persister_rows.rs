use chrono::{DateTime, Utc};

use crate::{ForksCounter, StarsCounter, TrendingRepository};

/// A row of the trending aggregation, as returned by every backend.
#[derive(sqlx::FromRow, Debug)]
pub(crate) struct TrendingRow {
    full_name: String,
    description: String,
    language: String,
    max_stars: i64,
    max_forks: i64,
    collected_at: DateTime<Utc>,
    last_recorded_at: DateTime<Utc>,
}

impl From<TrendingRow> for TrendingRepository {
    fn from(row: TrendingRow) -> Self {
        Self {
            full_name: row.full_name,
            description: row.description,
            language: row.language,
            max_stars: StarsCounter(row.max_stars as u32),
            max_forks: ForksCounter(row.max_forks as u32),
            collected_at: row.collected_at,
            last_recorded_at: row.last_recorded_at,
        }
    }
}
