use std::{collections::HashSet, fmt};

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::domain::PullRequest;

/// Distribution of one numeric sample. Every field is `0` for an empty sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Summary {
    pub average: f64,
    pub median: f64,
    pub deviation: f64,
    pub p80: f64,
    pub p90: f64,
}

impl Summary {
    pub fn of(sample: &[f64]) -> Self {
        if sample.is_empty() {
            return Self::default();
        }

        let mut sorted = sample.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            average: mean(&sorted),
            median: percentile(&sorted, 0.5),
            deviation: population_deviation(&sorted),
            p80: percentile(&sorted, 0.8),
            p90: percentile(&sorted, 0.9),
        }
    }

    fn floored(self) -> Self {
        Self {
            average: self.average.floor(),
            median: self.median.floor(),
            deviation: self.deviation.floor(),
            p80: self.p80.floor(),
            p90: self.p90.floor(),
        }
    }
}

pub fn mean(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    sample.iter().sum::<f64>() / sample.len() as f64
}

pub fn population_deviation(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    let avg = mean(sample);
    let variance =
        sample.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / sample.len() as f64;
    variance.sqrt()
}

/// Linear interpolation between the order statistics around `p * (n - 1)`.
/// `sorted` must be in ascending order.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    let fraction = index - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Numeric samples summarised per pull request population.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Additions,
    Deletions,
    LeadTime,
    TimeToMerge,
    CommitToPr,
    TimeToMergeFromFirstReview,
    TimeToFirstApprove,
    TimeToLastApprove,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Additions,
        Metric::Deletions,
        Metric::LeadTime,
        Metric::TimeToMerge,
        Metric::CommitToPr,
        Metric::TimeToMergeFromFirstReview,
        Metric::TimeToFirstApprove,
        Metric::TimeToLastApprove,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Additions => "additions",
            Metric::Deletions => "deletions",
            Metric::LeadTime => "leadTimeSeconds",
            Metric::TimeToMerge => "timeToMergeSeconds",
            Metric::CommitToPr => "commitToPRSeconds",
            Metric::TimeToMergeFromFirstReview => "timeToMergeFromFirstReviewSeconds",
            Metric::TimeToFirstApprove => "firstApproveSeconds",
            Metric::TimeToLastApprove => "lastApproveSeconds",
        }
    }

    /// Timing statistics are reported in whole seconds.
    pub fn is_timing(&self) -> bool {
        !matches!(self, Metric::Additions | Metric::Deletions)
    }

    pub fn value(&self, pr: &PullRequest) -> Option<f64> {
        let info = pr.info();
        let d = pr.durations();
        match self {
            Metric::Additions => Some(info.additions as f64),
            Metric::Deletions => Some(info.deletions as f64),
            Metric::LeadTime => Some(d.lead_time_seconds),
            Metric::TimeToMerge => Some(d.time_to_merge_seconds),
            Metric::CommitToPr => Some(d.commit_to_pr_seconds),
            Metric::TimeToMergeFromFirstReview => d.time_to_merge_from_first_review_seconds,
            Metric::TimeToFirstApprove => d.time_to_first_approve_seconds,
            Metric::TimeToLastApprove => d.time_to_last_approve_seconds,
        }
    }

    pub fn sample(&self, prs: &[PullRequest]) -> Vec<f64> {
        prs.iter().filter_map(|pr| self.value(pr)).collect()
    }

    pub fn summarise(&self, prs: &[PullRequest]) -> Summary {
        let summary = Summary::of(&self.sample(prs));
        if self.is_timing() {
            summary.floored()
        } else {
            summary
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StatValue {
    Count(usize),
    Value(f64),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Count(count) => write!(f, "{count}"),
            StatValue::Value(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for StatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StatValue::Count(count) => serializer.serialize_u64(*count as u64),
            StatValue::Value(value) => serializer.serialize_f64(*value),
        }
    }
}

/// Population statistics for a set of merged pull requests.
#[derive(Clone, Debug, PartialEq)]
pub struct PullRequestStat {
    pub count: usize,
    pub author_count: usize,
    pub metrics: Vec<(Metric, Summary)>,
}

impl PullRequestStat {
    pub fn from_pull_requests(prs: &[PullRequest]) -> Self {
        // Missing authors collapse into a single placeholder identity.
        let authors: HashSet<Option<&str>> = prs
            .iter()
            .map(|pr| pr.info().author.as_deref())
            .collect();

        Self {
            count: prs.len(),
            author_count: authors.len(),
            metrics: Metric::ALL
                .iter()
                .map(|metric| (*metric, metric.summarise(prs)))
                .collect(),
        }
    }

    /// Named statistics in reporting order.
    pub fn entries(&self) -> Vec<(String, StatValue)> {
        let mut entries = vec![
            ("count".to_owned(), StatValue::Count(self.count)),
            ("authorCount".to_owned(), StatValue::Count(self.author_count)),
        ];
        for (metric, summary) in &self.metrics {
            let label = metric.label();
            entries.extend([
                (format!("{label}Average"), StatValue::Value(summary.average)),
                (format!("{label}Median"), StatValue::Value(summary.median)),
                (format!("{label}Deviation"), StatValue::Value(summary.deviation)),
                (format!("{label}80"), StatValue::Value(summary.p80)),
                (format!("{label}90"), StatValue::Value(summary.p90)),
            ]);
        }
        entries
    }
}

impl Serialize for PullRequestStat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (name, value) in &entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        PullRequestInfo,
        fixtures::{info, instant},
    };

    fn pr_with(
        author: Option<&str>,
        customise: impl FnOnce(&mut PullRequestInfo),
    ) -> PullRequest {
        let mut raw = info();
        raw.author = author.map(str::to_owned);
        customise(&mut raw);
        PullRequest::new(raw)
    }

    impl PullRequestStat {
        fn summary(&self, metric: Metric) -> Summary {
            self.metrics
                .iter()
                .find(|(m, _)| *m == metric)
                .map(|(_, summary)| *summary)
                .unwrap_or_default()
        }
    }

    #[test]
    fn empty_sample_is_all_zero() {
        assert_eq!(Summary::of(&[]), Summary::default());
        assert_eq!(percentile(&[], 0.9), 0.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_deviation(&[]), 0.0);
    }

    #[test]
    fn three_value_sample_interpolates() {
        let summary = Summary::of(&[30.0, 10.0, 20.0]);
        assert_eq!(summary.average, 20.0);
        assert_eq!(summary.median, 20.0);
        assert!((summary.p80 - 26.0).abs() < 1e-9);
        assert!((summary.p90 - 28.0).abs() < 1e-9);
        assert!((summary.deviation - (200.0f64 / 3.0).sqrt()).abs() < 1e-9);

        let floored = summary.floored();
        assert_eq!(floored.p80, 26.0);
        assert_eq!(floored.p90, 28.0);
        assert_eq!(floored.deviation, 8.0);
    }

    #[test]
    fn even_sample_median_is_midpoint() {
        let summary = Summary::of(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(summary.median, 2.5);
        assert_eq!(summary.average, 2.5);
    }

    #[test]
    fn single_value_sample() {
        let summary = Summary::of(&[42.0]);
        assert_eq!(summary.median, 42.0);
        assert_eq!(summary.p90, 42.0);
        assert_eq!(summary.deviation, 0.0);
    }

    #[test]
    fn timing_floor_rounds_towards_negative_infinity() {
        let summary = Summary::of(&[-1.5]).floored();
        assert_eq!(summary.average, -2.0);
    }

    #[test]
    fn author_count_groups_missing_authors() {
        let prs = [
            pr_with(Some("A"), |_| {}),
            pr_with(Some("B"), |_| {}),
            pr_with(Some("A"), |_| {}),
            pr_with(None, |_| {}),
        ];
        let stat = PullRequestStat::from_pull_requests(&prs);
        assert_eq!(stat.count, 4);
        assert_eq!(stat.author_count, 3);
    }

    #[test]
    fn missing_review_timings_are_filtered_not_zeroed() {
        let prs = [
            pr_with(Some("A"), |raw| {
                raw.first_reviewed_at = Some(instant("2024-03-01T22:00:00Z"));
            }),
            pr_with(Some("B"), |_| {}),
        ];
        let stat = PullRequestStat::from_pull_requests(&prs);

        let from_review = stat.summary(Metric::TimeToMergeFromFirstReview);
        assert_eq!(from_review.average, 12.0 * 3600.0);
        assert_eq!(from_review.deviation, 0.0);
        assert_eq!(stat.summary(Metric::TimeToFirstApprove), Summary::default());
        assert_eq!(Metric::TimeToMergeFromFirstReview.sample(&prs).len(), 1);
        assert_eq!(Metric::LeadTime.sample(&prs).len(), 2);
    }

    #[test]
    fn size_statistics_keep_fractions() {
        let prs = [
            pr_with(Some("A"), |raw| raw.additions = 1),
            pr_with(Some("A"), |raw| raw.additions = 2),
        ];
        let stat = PullRequestStat::from_pull_requests(&prs);
        assert_eq!(stat.summary(Metric::Additions).average, 1.5);
    }

    #[test]
    fn timing_statistics_are_whole_seconds() {
        let prs = [
            pr_with(Some("A"), |raw| {
                raw.merged_at = instant("2024-03-01T10:00:01Z");
            }),
            pr_with(Some("A"), |raw| {
                raw.merged_at = instant("2024-03-01T10:00:02Z");
            }),
        ];
        let stat = PullRequestStat::from_pull_requests(&prs);
        assert_eq!(stat.summary(Metric::TimeToMerge).average, 1.0);
    }

    #[test]
    fn empty_population_reports_zeroes() {
        let stat = PullRequestStat::from_pull_requests(&[]);
        assert_eq!(stat.count, 0);
        assert_eq!(stat.author_count, 0);
        assert!(stat.metrics.iter().all(|(_, s)| *s == Summary::default()));
    }

    #[test]
    fn entries_are_named_in_reporting_order() {
        let stat = PullRequestStat::from_pull_requests(&[pr_with(Some("A"), |_| {})]);
        let names: Vec<String> = stat.entries().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names.len(), 2 + 5 * Metric::ALL.len());
        assert_eq!(&names[..4], ["count", "authorCount", "additionsAverage", "additionsMedian"]);
        assert!(names.contains(&"commitToPRSeconds90".to_owned()));
        assert_eq!(names.last().map(String::as_str), Some("lastApproveSeconds90"));
    }

    #[test]
    fn json_keeps_counts_integral() {
        let stat = PullRequestStat::from_pull_requests(&[pr_with(Some("A"), |_| {})]);
        let json = serde_json::to_value(&stat).unwrap();
        assert_eq!(json["count"], serde_json::json!(1));
        assert_eq!(json["leadTimeSecondsAverage"], serde_json::json!(93600.0));
    }
}
