use std::{fs, io, path::Path};

use thiserror::Error;
use tracing::info;

use crate::domain::PullRequest;

/// Reads a JSON array previously written by `log --format json`.
///
/// Only the raw attributes are read; timings are recomputed for every record.
pub fn load_pull_requests(path: &Path) -> Result<Vec<PullRequest>, DumpError> {
    let contents = fs::read_to_string(path)?;
    let prs: Vec<PullRequest> = serde_json::from_str(&contents)?;
    info!(
        path = %path.display(),
        pull_requests = prs.len(),
        "loaded pull request dump"
    );
    Ok(prs)
}

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("I/O error while reading the pull request dump: {0}")]
    Io(#[from] io::Error),
    #[error("Pull request dump is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::{
        domain::fixtures::{info, instant},
        report,
    };

    fn dump_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents).expect("write dump");
        file
    }

    #[test]
    fn written_dump_loads_with_identical_timings() {
        let mut reviewed = info();
        reviewed.first_reviewed_at = Some(instant("2024-03-01T11:00:00Z"));
        reviewed.first_approved_at = Some(instant("2024-03-01T12:00:00Z"));
        reviewed.last_approved_at = Some(instant("2024-03-01T18:00:00Z"));
        let mut orphaned = info();
        orphaned.author = None;
        let originals = vec![PullRequest::new(reviewed), PullRequest::new(orphaned)];

        let mut buffer = Vec::new();
        report::write_pull_requests(&mut buffer, &originals).unwrap();
        let file = dump_file(&buffer);

        let loaded = load_pull_requests(file.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        for (restored, original) in loaded.iter().zip(&originals) {
            assert_eq!(restored.durations(), original.durations());
            assert_eq!(restored.info(), original.info());
        }
    }

    #[test]
    fn minimal_records_load_without_optional_fields() {
        let file = dump_file(
            br#"[{
                "title": "t", "url": "u",
                "createdAt": "2024-03-01T10:00:00Z",
                "mergedAt": "2024-03-01T10:10:00Z",
                "authoredDate": "2024-03-01T09:00:00Z",
                "additions": 1, "deletions": 0, "commits": 1, "reviews": 0,
                "comments": 0, "changedFiles": 1
            }]"#,
        );
        let loaded = load_pull_requests(file.path()).unwrap();
        assert_eq!(loaded[0].info().author, None);
        assert_eq!(loaded[0].info().task, "");
        assert_eq!(loaded[0].durations().lead_time_seconds, 4200.0);
    }

    #[test]
    fn malformed_dump_is_rejected() {
        let file = dump_file(br#"[{"title": "missing everything else"}]"#);
        assert!(matches!(
            load_pull_requests(file.path()),
            Err(DumpError::Malformed(_))
        ));

        let file = dump_file(b"not json");
        assert!(matches!(
            load_pull_requests(file.path()),
            Err(DumpError::Malformed(_))
        ));
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let file = dump_file(
            br#"[{
                "title": "t", "url": "u",
                "createdAt": "yesterday",
                "mergedAt": "2024-03-01T10:10:00Z",
                "authoredDate": "2024-03-01T09:00:00Z",
                "additions": 1, "deletions": 0, "commits": 1, "reviews": 0,
                "comments": 0, "changedFiles": 1
            }]"#,
        );
        assert!(matches!(
            load_pull_requests(file.path()),
            Err(DumpError::Malformed(_))
        ));
    }

    #[test]
    fn missing_dump_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_pull_requests(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(DumpError::Io(_))));
    }
}
