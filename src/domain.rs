use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

// Domain data structures shared across modules.

/// Placeholder written wherever an author account no longer exists.
pub const UNKNOWN_AUTHOR: &str = "undefined";

/// Raw attributes of one merged pull request, as collected or as read back
/// from a dump.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestInfo {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: DateTime<Utc>,
    pub additions: u64,
    pub deletions: u64,
    /// Authored date of the earliest commit, or `created_at` without commits.
    pub authored_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_approved_at: Option<DateTime<Utc>>,
    pub commits: u64,
    pub reviews: u64,
    pub comments: u64,
    pub changed_files: u64,
    #[serde(default)]
    pub task: String,
}

/// Timing metrics in seconds. Negative values are kept as-is.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Durations {
    pub lead_time_seconds: f64,
    pub time_to_merge_seconds: f64,
    #[serde(rename = "commitToPRSeconds")]
    pub commit_to_pr_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_first_review_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_merge_from_first_review_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_first_approve_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_last_approve_seconds: Option<f64>,
}

impl Durations {
    pub fn derive(info: &PullRequestInfo) -> Self {
        let since_created = |at: DateTime<Utc>| seconds_between(at, info.created_at);
        Self {
            lead_time_seconds: seconds_between(info.merged_at, info.authored_date),
            time_to_merge_seconds: seconds_between(info.merged_at, info.created_at),
            commit_to_pr_seconds: seconds_between(info.created_at, info.authored_date),
            time_to_first_review_seconds: info.first_reviewed_at.map(since_created),
            time_to_merge_from_first_review_seconds: info
                .first_reviewed_at
                .map(|at| seconds_between(info.merged_at, at)),
            time_to_first_approve_seconds: info.first_approved_at.map(since_created),
            time_to_last_approve_seconds: info.last_approved_at.map(since_created),
        }
    }
}

fn seconds_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

/// A merged pull request together with its derived timings.
///
/// Durations are computed once in [`PullRequest::new`]; deserializing goes
/// through the same constructor, so timings stored in a dump are ignored and
/// recomputed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "PullRequestInfo")]
pub struct PullRequest {
    #[serde(flatten)]
    info: PullRequestInfo,
    #[serde(flatten)]
    durations: Durations,
}

impl PullRequest {
    pub fn new(info: PullRequestInfo) -> Self {
        let durations = Durations::derive(&info);
        Self { info, durations }
    }

    pub fn info(&self) -> &PullRequestInfo {
        &self.info
    }

    pub fn durations(&self) -> &Durations {
        &self.durations
    }
}

impl From<PullRequestInfo> for PullRequest {
    fn from(info: PullRequestInfo) -> Self {
        Self::new(info)
    }
}

/// One submitted review, flattened with the pull request it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(serialize_with = "author_or_placeholder")]
    pub author: Option<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub state: String,
    pub pr_title: String,
    #[serde(serialize_with = "author_or_placeholder")]
    pub pr_author: Option<String>,
    pub pr_url: String,
    pub pr_created_at: DateTime<Utc>,
    pub pr_merged_at: DateTime<Utc>,
    pub pr_comments: u64,
    pub pr_changed_files: u64,
}

impl Review {
    pub fn on(
        pr: &PullRequest,
        author: Option<String>,
        url: String,
        created_at: DateTime<Utc>,
        state: String,
    ) -> Self {
        let info = pr.info();
        Self {
            author,
            url,
            created_at,
            state,
            pr_title: info.title.clone(),
            pr_author: info.author.clone(),
            pr_url: info.url.clone(),
            pr_created_at: info.created_at,
            pr_merged_at: info.merged_at,
            pr_comments: info.comments,
            pr_changed_files: info.changed_files,
        }
    }
}

fn author_or_placeholder<S: Serializer>(
    author: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(author.as_deref().unwrap_or(UNKNOWN_AUTHOR))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn instant(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    pub fn info() -> PullRequestInfo {
        PullRequestInfo {
            title: "Add pagination".into(),
            author: Some("alice".into()),
            url: "https://github.com/acme/widgets/pull/1".into(),
            created_at: instant("2024-03-01T10:00:00Z"),
            merged_at: instant("2024-03-02T10:00:00Z"),
            additions: 120,
            deletions: 30,
            authored_date: instant("2024-03-01T08:00:00Z"),
            first_reviewed_at: None,
            first_approved_at: None,
            last_approved_at: None,
            commits: 3,
            reviews: 0,
            comments: 2,
            changed_files: 4,
            task: String::new(),
        }
    }
}
