use std::io::{self, Write};

use thiserror::Error;

use crate::{
    domain::{PullRequest, Review},
    stats::PullRequestStat,
};

/// Header of the review table, matching the serialized `Review` fields.
pub const REVIEW_COLUMNS: [&str; 11] = [
    "author",
    "url",
    "createdAt",
    "state",
    "prTitle",
    "prAuthor",
    "prUrl",
    "prCreatedAt",
    "prMergedAt",
    "prComments",
    "prChangedFiles",
];

pub fn write_pull_requests<W: Write>(mut out: W, prs: &[PullRequest]) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(&mut out, prs)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_reviews<W: Write>(out: W, reviews: &[Review]) -> Result<(), ReportError> {
    let mut writer = tab_writer(out);
    writer.write_record(REVIEW_COLUMNS)?;
    for review in reviews {
        writer.serialize(review)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_stat_table<W: Write>(out: W, stat: &PullRequestStat) -> Result<(), ReportError> {
    let entries = stat.entries();
    let mut writer = tab_writer(out);
    writer.write_record(entries.iter().map(|(name, _)| name.as_str()))?;
    writer.write_record(entries.iter().map(|(_, value)| value.to_string()))?;
    writer.flush()?;
    Ok(())
}

pub fn write_stat_json<W: Write>(mut out: W, stat: &PullRequestStat) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(&mut out, stat)?;
    writeln!(out)?;
    Ok(())
}

fn tab_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(out)
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to serialize JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write tabular output: {0}")]
    Csv(#[from] csv::Error),
}
