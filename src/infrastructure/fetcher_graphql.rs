#![allow(non_snake_case)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gql_client::{Client, GraphQLError};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    FetcherRateLimit, ForksCounter, IssuePrCounts, RepoRecord, RepositoryFetcher, RepositoryId,
    Response, SourceError, StarsCounter, TrendingQuery,
};

/// The GraphQL production endpoint for GitHub.
pub const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

const REPOSITORY_FIELDS_FRAGMENT: &str = r#"
fragment RepositoryFields on Repository {
  databaseId
  name
  nameWithOwner
  description
  primaryLanguage {
    name
  }
  stargazerCount
  forkCount
  owner {
    login
    url
  }
  url
  createdAt
  updatedAt
  openIssues: issues(states: OPEN) {
    totalCount
  }
  closedIssues: issues(states: CLOSED) {
    totalCount
  }
  openPullRequests: pullRequests(states: OPEN) {
    totalCount
  }
  closedPullRequests: pullRequests(states: [CLOSED, MERGED]) {
    totalCount
  }
}
"#;

const SEARCH_QUERY: &str = r#"
query ($query: String!, $first: Int!, $after: String) {
  search(query: $query, type: REPOSITORY, first: $first, after: $after) {
    edges {
      node {
        ... on Repository {
          ...RepositoryFields
        }
      }
    }
    pageInfo {
      endCursor
      hasNextPage
    }
  }
  rateLimit {
    limit
    cost
    remaining
    resetAt
  }
}
"#;

const REPOSITORY_QUERY: &str = r#"
query ($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    ...RepositoryFields
  }
  rateLimit {
    limit
    cost
    remaining
    resetAt
  }
}
"#;

/// GitHub reports an unknown repository with this message.
const NOT_FOUND_MESSAGE: &str = "Could not resolve to a Repository";

/// gql_client reports undecodable payloads with this message, before checking the HTTP status.
const PARSE_FAILURE_MESSAGE: &str = "Failed to parse response";

/// gql_client appends the raw body to parse failures after this marker.
const RESPONSE_BODY_MARKER: &str = "The response body is: ";

/// A parse failure on a JSON body is a payload shape mismatch. On any other body
/// (gateway error pages, truncated transfers) the source itself failed.
fn is_malformed_payload(message: &str) -> bool {
    message.contains(PARSE_FAILURE_MESSAGE)
        && message
            .split_once(RESPONSE_BODY_MARKER)
            .is_some_and(|(_, body)| serde_json::from_str::<serde_json::Value>(body).is_ok())
}

fn classify_graphql_error(error: GraphQLError, full_name: Option<&str>) -> SourceError {
    let details = format!("{error:?}");
    if let Some(full_name) = full_name.filter(|_| details.contains(NOT_FOUND_MESSAGE)) {
        return SourceError::NotFound(full_name.to_string());
    }
    if is_malformed_payload(error.message()) {
        error!("Failed to parse GraphQL response: {}", error.message());
        return SourceError::Parse(error.message().to_string());
    }

    SourceError::Unavailable(details.trim().to_string())
}

#[derive(Deserialize, Debug)]
struct SearchQueryData {
    search: SearchResult,
    rateLimit: RateLimit,
}

#[derive(Deserialize, Debug)]
struct RepositoryQueryData {
    repository: Option<RepositoryNode>,
    rateLimit: RateLimit,
}

#[derive(Deserialize, Debug)]
struct SearchResult {
    edges: Vec<Option<SearchEdge>>,
    pageInfo: PageInfo,
}

#[derive(Deserialize, Debug)]
struct SearchEdge {
    node: RepositoryNode,
}

#[derive(Deserialize, Debug)]
struct RepositoryNode {
    databaseId: Option<u64>,
    name: String,
    nameWithOwner: String,
    description: Option<String>,
    primaryLanguage: Option<Language>,
    stargazerCount: u32,
    forkCount: u32,
    owner: Owner,
    url: String,
    createdAt: DateTime<Utc>,
    updatedAt: DateTime<Utc>,
    openIssues: TotalCount,
    closedIssues: TotalCount,
    openPullRequests: TotalCount,
    closedPullRequests: TotalCount,
}

impl RepositoryNode {
    fn into_record(self, collected_at: DateTime<Utc>) -> Result<RepoRecord, SourceError> {
        let Some(database_id) = self.databaseId else {
            return Err(SourceError::Parse(format!(
                "Repository {} has no database id",
                self.nameWithOwner
            )));
        };

        Ok(RepoRecord {
            repo_id: RepositoryId(database_id),
            name: self.name,
            full_name: self.nameWithOwner,
            description: self
                .description
                .unwrap_or_else(|| RepoRecord::DEFAULT_DESCRIPTION.to_string()),
            language: self
                .primaryLanguage
                .map(|language| language.name)
                .unwrap_or_else(|| RepoRecord::DEFAULT_LANGUAGE.to_string()),
            owner: self.owner.login,
            owner_url: self.owner.url,
            html_url: self.url,
            created_at: self.createdAt,
            updated_at: self.updatedAt,
            collected_at,
            stars: StarsCounter(self.stargazerCount),
            forks: ForksCounter(self.forkCount),
            issues_prs: IssuePrCounts {
                open_issues: self.openIssues.totalCount,
                closed_issues: self.closedIssues.totalCount,
                open_prs: self.openPullRequests.totalCount,
                closed_prs: self.closedPullRequests.totalCount,
            },
        })
    }
}

#[derive(Deserialize, Debug)]
struct Language {
    name: String,
}

#[derive(Deserialize, Debug)]
struct Owner {
    login: String,
    url: String,
}

#[derive(Deserialize, Debug)]
struct TotalCount {
    totalCount: u32,
}

#[derive(Deserialize, Debug)]
struct PageInfo {
    endCursor: Option<String>,
    hasNextPage: bool,
}

#[derive(Deserialize, Debug)]
struct RateLimit {
    limit: i32,
    cost: i32,
    remaining: i32,
    resetAt: String,
}

impl From<RateLimit> for FetcherRateLimit {
    fn from(rate_limit: RateLimit) -> Self {
        Self {
            limit: rate_limit.limit,
            cost: rate_limit.cost,
            remaining: rate_limit.remaining,
            reset_at: rate_limit.resetAt,
        }
    }
}

/// The variables of the GraphQL search query
#[derive(Debug, Serialize)]
struct GraphQlSearchQuery {
    /// The search query string.
    query: String,
    /// The number of repositories to return.
    first: u16,
    /// The cursor for pagination.
    after: Option<String>,
}

impl From<&TrendingQuery> for GraphQlSearchQuery {
    fn from(query: &TrendingQuery) -> Self {
        Self {
            query: query.search_string(),
            first: query.first,
            after: query.after.to_owned(),
        }
    }
}

/// The variables of the GraphQL repository query
#[derive(Debug, Serialize)]
struct GraphQlRepositoryQuery {
    owner: String,
    name: String,
}

impl GraphQlRepositoryQuery {
    fn try_new(full_name: &str) -> Result<Self, SourceError> {
        match full_name.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(SourceError::NotFound(full_name.to_string())),
        }
    }
}

/// Fetches repository data from the GitHub GraphQL API.
pub struct GraphQlFetcher {
    client: Client,
}

impl GraphQlFetcher {
    /// Creates a new `GraphQlFetcher` instance authenticated with the given token.
    pub fn new(endpoint: &str, github_token: &str) -> Self {
        let bearer_token = format!("Bearer {}", github_token);
        let mut headers = HashMap::from([("User-Agent", "github-trends")]);
        headers.insert("Authorization", &bearer_token);
        let client = Client::new_with_headers(endpoint, headers);

        Self { client }
    }

    async fn fetch_page(&self, query: &TrendingQuery) -> Result<Response, SourceError> {
        let fetched_data = self
            .client
            .query_with_vars_unwrap::<SearchQueryData, GraphQlSearchQuery>(
                &format!("{SEARCH_QUERY}{REPOSITORY_FIELDS_FRAGMENT}"),
                query.into(),
            )
            .await
            .map_err(|e| classify_graphql_error(e, None))?;
        let collected_at = Utc::now();
        let next_cursor = if fetched_data.search.pageInfo.hasNextPage {
            fetched_data.search.pageInfo.endCursor
        } else {
            None
        };

        Ok(Response::new(
            fetched_data
                .search
                .edges
                .into_iter()
                .flatten()
                .filter_map(|edge| match edge.node.into_record(collected_at) {
                    Ok(repository) => Some(repository),
                    Err(e) => {
                        warn!("Skipping search result: {e}");
                        None
                    }
                })
                .collect(),
            fetched_data.rateLimit.into(),
            next_cursor,
        ))
    }
}

fn page_size(remaining: usize) -> u16 {
    remaining.min(TrendingQuery::MAX_PAGE_SIZE as usize) as u16
}

#[async_trait::async_trait]
impl RepositoryFetcher for GraphQlFetcher {
    async fn search_trending(&self, days: u32, limit: u32) -> Result<Vec<RepoRecord>, SourceError> {
        let limit = limit as usize;
        let mut repositories = Vec::with_capacity(limit);
        if limit == 0 {
            return Ok(repositories);
        }

        let mut query = TrendingQuery::created_within_days(days, Utc::now(), page_size(limit));
        loop {
            info!("Processing request: {query}");
            let response = self.fetch_page(&query).await?;
            if response.rate_limit().is_exceeded() {
                warn!("Fetcher rate limit exhausted: {}", response.rate_limit());
            }
            let next_cursor = response.next_cursor;
            repositories.extend(response.repositories);

            let remaining = limit.saturating_sub(repositories.len());
            match next_cursor {
                Some(cursor) if remaining > 0 => {
                    query = query.next_page(cursor, page_size(remaining));
                }
                _ => break,
            }
        }
        repositories.truncate(limit);
        info!("Fetched {} trending repositories", repositories.len());

        Ok(repositories)
    }

    async fn get_repo(&self, full_name: &str) -> Result<RepoRecord, SourceError> {
        let variables = GraphQlRepositoryQuery::try_new(full_name)?;
        let fetched_data = self
            .client
            .query_with_vars_unwrap::<RepositoryQueryData, GraphQlRepositoryQuery>(
                &format!("{REPOSITORY_QUERY}{REPOSITORY_FIELDS_FRAGMENT}"),
                variables,
            )
            .await
            .map_err(|e| classify_graphql_error(e, Some(full_name)))?;
        let rate_limit: FetcherRateLimit = fetched_data.rateLimit.into();
        if rate_limit.is_exceeded() {
            warn!("Fetcher rate limit exhausted: {rate_limit}");
        }
        let repository = fetched_data
            .repository
            .ok_or_else(|| SourceError::NotFound(full_name.to_string()))?
            .into_record(Utc::now())?;
        info!("Fetched {repository}");

        Ok(repository)
    }
}
