use std::sync::Arc;

use log::{info, warn};

use crate::{
    CandidateFailure, CollectError, CollectStep, CollectionSummary, RepoRecord, RepositoryFetcher,
    RepositoryPersister, SourceError, StoreError, UpsertOutcome,
};

/// Feeds repository snapshots from a fetcher into a persister, one run at a time.
///
/// For every candidate the identity row is written first, then the trend sample,
/// then the issues/PRs sample. A failing candidate never stops the run.
pub struct Collector {
    fetcher: Arc<dyn RepositoryFetcher>,
    persister: Arc<dyn RepositoryPersister>,
}

impl Collector {
    /// Creates a new `Collector` instance with the given fetcher and persister.
    pub fn new(
        fetcher: Arc<dyn RepositoryFetcher>,
        persister: Arc<dyn RepositoryPersister>,
    ) -> Self {
        Self { fetcher, persister }
    }

    /// Collects the trending repositories created within the last `days` days.
    ///
    /// Fails only if the search itself fails; per-candidate failures are reported in the summary.
    pub async fn collect_trending(
        &self,
        days: u32,
        limit: u32,
    ) -> Result<CollectionSummary, SourceError> {
        let candidates = self.fetcher.search_trending(days, limit).await?;
        if candidates.is_empty() {
            warn!("No trending repositories found for the last {days} days");
        }
        let mut summary = CollectionSummary::default();
        for candidate in &candidates {
            info!("Fetched {candidate}");
            let result = self.persist_candidate(candidate).await;
            record_outcome(&mut summary, &candidate.full_name, result);
        }
        info!("{summary}");

        Ok(summary)
    }

    /// Collects the given repositories by name. Unknown repositories are skipped and reported.
    pub async fn collect_named(&self, full_names: &[String]) -> CollectionSummary {
        let mut summary = CollectionSummary::default();
        for full_name in full_names {
            let result = match self.fetcher.get_repo(full_name).await {
                Ok(candidate) => self.persist_candidate(&candidate).await,
                Err(source) => Err(CollectError::Source {
                    step: CollectStep::Fetch,
                    source,
                }),
            };
            record_outcome(&mut summary, full_name, result);
        }
        info!("{summary}");

        summary
    }

    async fn persist_candidate(&self, candidate: &RepoRecord) -> Result<UpsertOutcome, CollectError> {
        let outcome = self
            .persister
            .upsert_repo(candidate)
            .await
            .map_err(store_failure(CollectStep::UpsertRepo))?;
        self.persister
            .append_trend(&candidate.trend_sample())
            .await
            .map_err(store_failure(CollectStep::AppendTrend))?;
        self.persister
            .append_issue_pr_counts(&candidate.issue_pr_sample())
            .await
            .map_err(store_failure(CollectStep::AppendIssuesPrs))?;

        Ok(outcome)
    }
}

fn store_failure(step: CollectStep) -> impl FnOnce(StoreError) -> CollectError {
    move |source| CollectError::Store { step, source }
}

fn record_outcome(
    summary: &mut CollectionSummary,
    full_name: &str,
    result: Result<UpsertOutcome, CollectError>,
) {
    summary.total_attempted += 1;
    match result {
        Ok(UpsertOutcome::Inserted) => {
            summary.total_succeeded += 1;
            summary.total_inserted += 1;
        }
        Ok(UpsertOutcome::Updated) => {
            summary.total_succeeded += 1;
            summary.total_updated += 1;
        }
        Err(error) => {
            let failure = CandidateFailure {
                full_name: full_name.to_string(),
                error,
            };
            warn!("Skipping {failure}");
            summary.failures.push(failure);
        }
    }
}
