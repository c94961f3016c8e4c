use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use reqwest::{
    blocking::Client,
    header::{ACCEPT, USER_AGENT},
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    config::Settings,
    domain::{PullRequest, PullRequestInfo, Review},
    extract::{self, ReviewEvent, TaskMatcher},
};

const USER_AGENT_HEADER: &str = "merge-metrics/0.1";
const PAGE_SIZE: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);

const SEARCH_QUERY: &str = r#"
query($q: String!, $first: Int!, $after: String) {
  search(type: ISSUE, first: $first, query: $q, after: $after) {
    issueCount
    nodes {
      ... on PullRequest {
        title
        body
        author {
          login
        }
        url
        createdAt
        mergedAt
        additions
        deletions
        changedFiles
        totalCommentsCount
        commits(first: 100) {
          nodes {
            commit {
              message
              authoredDate
            }
          }
        }
        reviews(first: 100) {
          nodes {
            ... on PullRequestReview {
              createdAt
              state
              author {
                login
              }
              url
            }
          }
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

pub fn build_client() -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(USER_AGENT_HEADER)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(FetchError::Http)
}

/// Optional bounds on the merge date.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// The `merged:<start>..<end>` qualifier, or `None` when unbounded.
    fn qualifier(&self) -> Option<String> {
        if self.start.is_none() && self.end.is_none() {
            return None;
        }
        let render = |bound: Option<DateTime<Utc>>| {
            bound
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default()
        };
        Some(format!("merged:{}..{}", render(self.start), render(self.end)))
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date_bound(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| format!("`{raw}` is neither an RFC 3339 timestamp nor a YYYY-MM-DD date"))
}

pub fn merged_search_query(query: &str, range: &DateRange) -> String {
    let mut q = format!("is:pr is:merged {}", query.trim());
    if let Some(qualifier) = range.qualifier() {
        q.push(' ');
        q.push_str(&qualifier);
    }
    q
}

/// One page of a cursor-paginated pull request search.
pub trait SearchService {
    fn search_page(&self, query: &str, after: Option<&str>) -> Result<SearchPage, FetchError>;
}

pub struct GitHubSearch {
    client: Client,
    endpoint: String,
    token: String,
}

impl GitHubSearch {
    pub fn new(client: Client, settings: &Settings) -> Self {
        Self {
            client,
            endpoint: settings.endpoint.clone(),
            token: settings.token.clone(),
        }
    }
}

impl SearchService for GitHubSearch {
    fn search_page(&self, query: &str, after: Option<&str>) -> Result<SearchPage, FetchError> {
        if self.token.is_empty() {
            return Err(FetchError::MissingToken);
        }

        let body = json!({
            "query": SEARCH_QUERY,
            "variables": { "q": query, "first": PAGE_SIZE, "after": after },
        });
        let response: GraphQlResponse<SearchData> = self
            .client
            .post(&self.endpoint)
            .header(USER_AGENT, USER_AGENT_HEADER)
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.token)
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        if !response.errors.is_empty() {
            let messages: Vec<&str> = response
                .errors
                .iter()
                .map(|err| err.message.as_str())
                .collect();
            return Err(FetchError::GraphQl(messages.join("; ")));
        }
        let data = response.data.ok_or(FetchError::EmptyResponse)?;
        Ok(SearchPage {
            nodes: data.search.nodes,
            page_info: data.search.page_info,
            rate_limit: data.rate_limit,
        })
    }
}

/// Everything gathered for one query, in page-arrival then node order.
#[derive(Debug, Default)]
pub struct Collection {
    pub pull_requests: Vec<PullRequest>,
    pub reviews: Vec<Review>,
}

impl Collection {
    fn push_node(&mut self, node: PullRequestNode, matcher: &TaskMatcher) {
        let (pr, reviews) = node.into_records(matcher);
        self.pull_requests.push(pr);
        self.reviews.extend(reviews);
    }
}

pub fn collect_merged_pull_requests<S: SearchService + ?Sized>(
    service: &S,
    matcher: &TaskMatcher,
    query: &str,
    range: &DateRange,
) -> Result<Collection, FetchError> {
    collect_pull_requests(service, matcher, &merged_search_query(query, range))
}

/// Pulls every page of `search_query`, one request at a time.
///
/// The first failing request aborts the whole collection.
pub fn collect_pull_requests<S: SearchService + ?Sized>(
    service: &S,
    matcher: &TaskMatcher,
    search_query: &str,
) -> Result<Collection, FetchError> {
    info!(query = search_query, "collecting merged pull requests");

    let mut collection = Collection::default();
    let mut after: Option<String> = None;
    loop {
        let page = service.search_page(search_query, after.as_deref())?;
        debug!(
            nodes = page.nodes.len(),
            has_next_page = page.page_info.has_next_page,
            end_cursor = page.page_info.end_cursor.as_deref().unwrap_or(""),
            "received search page"
        );
        // Logged only; pacing is not adjusted.
        if let Some(rate) = &page.rate_limit {
            debug!(
                limit = rate.limit,
                cost = rate.cost,
                remaining = rate.remaining,
                reset_at = %rate.reset_at,
                "GitHub rate limit"
            );
        }

        for node in page.nodes {
            collection.push_node(node, matcher);
        }

        if !page.page_info.has_next_page {
            break;
        }
        match page.page_info.end_cursor {
            Some(cursor) => after = Some(cursor),
            None => return Err(FetchError::MissingCursor),
        }
    }

    info!(
        pull_requests = collection.pull_requests.len(),
        reviews = collection.reviews.len(),
        "collection finished"
    );
    Ok(collection)
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("GitHub API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Account token is missing; set GITHUB_TOKEN")]
    MissingToken,
    #[error("GitHub GraphQL query failed: {0}")]
    GraphQl(String),
    #[error("GitHub returned no data for the search")]
    EmptyResponse,
    #[error("GitHub reported another page without an end cursor")]
    MissingCursor,
}

// Response payloads ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    search: SearchResult,
    rate_limit: Option<RateLimit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    nodes: Vec<PullRequestNode>,
    page_info: PageInfo,
}

#[derive(Debug)]
pub struct SearchPage {
    pub nodes: Vec<PullRequestNode>,
    pub page_info: PageInfo,
    pub rate_limit: Option<RateLimit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub limit: u64,
    pub cost: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct Actor {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct Nodes<T> {
    pub nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub title: String,
    pub body: Option<String>,
    pub author: Option<Actor>,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: DateTime<Utc>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub total_comments_count: u64,
    pub commits: Nodes<CommitNode>,
    pub reviews: Nodes<ReviewNode>,
}

#[derive(Debug, Deserialize)]
pub struct CommitNode {
    pub commit: Commit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub message: String,
    pub authored_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNode {
    pub created_at: DateTime<Utc>,
    pub state: String,
    pub author: Option<Actor>,
    pub url: String,
}

impl ReviewEvent for ReviewNode {
    fn state(&self) -> &str {
        &self.state
    }

    fn submitted_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl PullRequestNode {
    fn into_records(self, matcher: &TaskMatcher) -> (PullRequest, Vec<Review>) {
        let commits = &self.commits.nodes;
        let reviews = &self.reviews.nodes;

        let task = matcher.extract_task(
            &self.title,
            self.body.as_deref().unwrap_or(""),
            commits.iter().map(|node| node.commit.message.as_str()),
        );
        let authored_date = commits
            .first()
            .map(|node| node.commit.authored_date)
            .unwrap_or(self.created_at);

        let info = PullRequestInfo {
            author: self.author.map(|actor| actor.login),
            url: self.url,
            created_at: self.created_at,
            merged_at: self.merged_at,
            additions: self.additions,
            deletions: self.deletions,
            authored_date,
            first_reviewed_at: extract::first_review(reviews),
            first_approved_at: extract::first_approve(reviews),
            last_approved_at: extract::last_approve(reviews),
            commits: commits.len() as u64,
            reviews: reviews.len() as u64,
            comments: self.total_comments_count,
            changed_files: self.changed_files,
            task,
            title: self.title,
        };
        let pr = PullRequest::new(info);

        let reviews = self
            .reviews
            .nodes
            .into_iter()
            .map(|review| {
                Review::on(
                    &pr,
                    review.author.map(|actor| actor.login),
                    review.url,
                    review.created_at,
                    review.state,
                )
            })
            .collect();
        (pr, reviews)
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
