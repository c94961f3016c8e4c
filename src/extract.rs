use std::iter;

use chrono::{DateTime, Utc};
use regex::Regex;

pub const APPROVED: &str = "APPROVED";

/// A review as delivered by the platform, in retrieval order.
pub trait ReviewEvent {
    fn state(&self) -> &str;
    fn submitted_at(&self) -> DateTime<Utc>;
}

/// Submission time of the first review in retrieval order, whatever its state.
///
/// Nested reviews are not re-sorted, so this is not necessarily the
/// chronologically earliest review.
pub fn first_review<R: ReviewEvent>(reviews: &[R]) -> Option<DateTime<Utc>> {
    reviews.first().map(ReviewEvent::submitted_at)
}

pub fn first_approve<R: ReviewEvent>(reviews: &[R]) -> Option<DateTime<Utc>> {
    reviews
        .iter()
        .find(|review| review.state() == APPROVED)
        .map(ReviewEvent::submitted_at)
}

pub fn last_approve<R: ReviewEvent>(reviews: &[R]) -> Option<DateTime<Utc>> {
    reviews
        .iter()
        .rev()
        .find(|review| review.state() == APPROVED)
        .map(ReviewEvent::submitted_at)
}

/// Finds `<PREFIX>-<digits>` task identifiers for a configured set of
/// project prefixes.
#[derive(Clone, Debug)]
pub struct TaskMatcher {
    pattern: Option<Regex>,
}

impl TaskMatcher {
    pub fn new<S: AsRef<str>>(prefixes: &[S]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = prefixes
            .iter()
            .map(|prefix| prefix.as_ref().trim())
            .filter(|prefix| !prefix.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Ok(Self::disabled());
        }

        let pattern = Regex::new(&format!(r"\b(?:{})-[0-9]+", alternatives.join("|")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn disabled() -> Self {
        Self { pattern: None }
    }

    /// Returns the first identifier found in the title, then the body, then
    /// each commit message in order. Empty when nothing matches.
    pub fn extract_task<'a, I>(
        &self,
        title: &'a str,
        body: &'a str,
        commit_messages: I,
    ) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(pattern) = &self.pattern else {
            return String::new();
        };

        iter::once(title)
            .chain(iter::once(body))
            .chain(commit_messages)
            .find_map(|text| pattern.find(text))
            .map(|found| found.as_str().to_owned())
            .unwrap_or_default()
    }
}
