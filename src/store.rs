use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::domain::{BookingRequest, Submission, SubmissionId};

pub const SUBMISSIONS_FILE: &str = "submissions.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} does not contain a list of submissions: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode submissions: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Hands out millisecond timestamps as ids, bumping by one when two
/// submissions land in the same millisecond so ids stay unique and ordered.
#[derive(Debug, Default)]
struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    fn next(&self, now: DateTime<Utc>) -> SubmissionId {
        let now = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1).to_string()
    }
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    ids: IdGenerator,
    writer: Mutex<()>,
}

/// Submissions kept most-recent-first in a single JSON document.
///
/// Every append rewrites the whole file. Appends within one process are
/// serialized; separate processes sharing the file can still lose updates.
#[derive(Clone, Debug)]
pub struct SubmissionStore {
    inner: Arc<Inner>,
}

impl SubmissionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                ids: IdGenerator::default(),
                writer: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Records `request` and returns it with its assigned id and timestamp.
    ///
    /// Persistence failures are logged and swallowed: the caller always gets
    /// the submission back, even when it never reached the disk.
    pub async fn append(&self, request: BookingRequest) -> Submission {
        let _writer = self.inner.writer.lock().await;

        let submitted_at = Utc::now();
        let submission = Submission {
            id: self.inner.ids.next(submitted_at),
            request,
            submitted_at,
        };

        match self.persist(&submission).await {
            Ok(count) => info!(id = %submission.id, count, "submission recorded"),
            Err(error) => error!(
                id = %submission.id,
                path = %self.path().display(),
                %error,
                "submission was not persisted"
            ),
        }

        submission
    }

    /// All submissions, most recent first. A missing file is an empty list.
    pub async fn list(&self) -> Result<Vec<Submission>, StoreError> {
        let path = self.path();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no submissions file yet");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_owned(),
            source,
        })
    }

    // A corrupt file aborts the write instead of being replaced, so existing
    // records are never clobbered by a one-element list.
    async fn persist(&self, submission: &Submission) -> Result<usize, StoreError> {
        let mut submissions = self.list().await?;
        submissions.insert(0, submission.clone());
        self.write_all(&submissions).await?;
        Ok(submissions.len())
    }

    async fn write_all(&self, submissions: &[Submission]) -> Result<(), StoreError> {
        let path = self.path();
        let write_error = |source| StoreError::Write {
            path: path.to_owned(),
            source,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        let contents = serde_json::to_vec_pretty(submissions)?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, contents)
            .await
            .map_err(write_error)?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(write_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use tempfile::tempdir;

    use super::*;
    use crate::domain::test::booking;

    #[tokio::test]
    async fn missing_file_lists_empty() {
        let dir = tempdir().unwrap();
        let store = SubmissionStore::new(dir.path().join("nested").join(SUBMISSIONS_FILE));

        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn append_then_list_returns_newest_first() {
        let dir = tempdir().unwrap();
        let store = SubmissionStore::new(dir.path().join("data").join(SUBMISSIONS_FILE));

        let first = store.append(booking()).await;
        let mut second_request = booking();
        second_request.full_name = "Khalid".into();
        let second = store.append(second_request.clone()).await;

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], second);
        assert_eq!(listed[0].request, second_request);
        assert_eq!(listed[1], first);
        assert!(second.id.parse::<u64>().unwrap() > first.id.parse::<u64>().unwrap());
        assert!(second.submitted_at >= first.submitted_at);
    }

    #[tokio::test]
    async fn list_is_repeatable() {
        let dir = tempdir().unwrap();
        let store = SubmissionStore::new(dir.path().join(SUBMISSIONS_FILE));
        store.append(booking()).await;

        assert_eq!(store.list().await.unwrap(), store.list().await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let dir = tempdir().unwrap();
        let store = SubmissionStore::new(dir.path().join(SUBMISSIONS_FILE));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.append(booking()).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 16);
        let ids: HashSet<_> = listed.iter().map(|submission| &submission.id).collect();
        assert_eq!(ids.len(), 16);
    }

    #[tokio::test]
    async fn write_failure_still_returns_submission() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = SubmissionStore::new(blocker.join(SUBMISSIONS_FILE));

        let submission = store.append(booking()).await;
        assert!(!submission.id.is_empty());
        assert_eq!(submission.request, booking());

        // once storage is usable again the lost record is simply absent
        std::fs::remove_file(&blocker).unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_and_left_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SUBMISSIONS_FILE);
        std::fs::write(&path, b"{ not json").unwrap();
        let store = SubmissionStore::new(&path);

        assert!(matches!(
            store.list().await,
            Err(StoreError::Corrupt { .. })
        ));

        store.append(booking()).await;
        assert_eq!(std::fs::read(&path).unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn persisted_layout_is_a_json_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SUBMISSIONS_FILE);
        let store = SubmissionStore::new(&path);
        let submission = store.append(booking()).await;

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], submission.id.as_str());
        assert_eq!(records[0]["carName"], "KIA K3");
        assert_eq!(records[0]["total"], 420);
        assert!(records[0]["submittedAt"].is_string());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn ids_increase_within_the_same_millisecond() {
        let ids = IdGenerator::default();
        let now = Utc::now();

        let first: u64 = ids.next(now).parse().unwrap();
        let second: u64 = ids.next(now).parse().unwrap();
        let third: u64 = ids.next(now - chrono::Duration::seconds(5)).parse().unwrap();

        assert_eq!(first, u64::try_from(now.timestamp_millis()).unwrap());
        assert_eq!(second, first + 1);
        assert_eq!(third, first + 2);
    }
}
