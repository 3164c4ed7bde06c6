//! File-backed job store.
//!
//! [`JobStore`] keeps every job in an insertion-ordered in-memory index and
//! writes the whole collection through to a single JSON document on every
//! mutation. All mutations take the same async mutex for the full
//! read-modify-write-persist cycle, so concurrent updates of different jobs
//! never lose each other's writes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use jobsim_core::error::CoreError;
use jobsim_core::job::Job;
use jobsim_core::types::JobId;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Errors from the job store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Job store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The collection could not be encoded.
    #[error("Job store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `append` was called with an id that already exists.
    #[error("Job {0} already exists")]
    DuplicateId(JobId),

    /// `modify` was called for an unknown id.
    #[error("Job {0} not found")]
    NotFound(JobId),

    /// The requested change breaks a job invariant (e.g. a second
    /// transition out of a terminal status).
    #[error(transparent)]
    Rejected(#[from] CoreError),
}

/// Durable, process-wide job collection.
///
/// Designed to be wrapped in `Arc` and shared between the HTTP layer, the
/// scheduler and the orchestrator.
pub struct JobStore {
    path: PathBuf,
    jobs: Mutex<IndexMap<JobId, Job>>,
    recovered_from_corruption: bool,
}

impl JobStore {
    /// Open the store backed by the file at `path`.
    ///
    /// A missing file is an empty store. A file that is not a JSON array of
    /// jobs is logged and treated as empty; the next write replaces it.
    /// Only genuine I/O failures are returned as errors.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (jobs, recovered_from_corruption) = match tokio::fs::read(&path).await {
            Ok(bytes) => match decode(&bytes) {
                Ok(jobs) => (jobs, false),
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "Job store file is corrupted, starting with an empty collection",
                    );
                    (IndexMap::new(), true)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => (IndexMap::new(), false),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            count = jobs.len(),
            "Job store opened",
        );

        Ok(Self {
            path,
            jobs: Mutex::new(jobs),
            recovered_from_corruption,
        })
    }

    /// Path of the backing JSON document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`open`](Self::open) discarded a corrupted file.
    pub fn recovered_from_corruption(&self) -> bool {
        self.recovered_from_corruption
    }

    /// All jobs in creation order.
    pub async fn list_all(&self) -> Vec<Job> {
        self.jobs.lock().await.values().cloned().collect()
    }

    /// All jobs still waiting for resolution.
    pub async fn list_pending(&self) -> Vec<Job> {
        self.jobs
            .lock()
            .await
            .values()
            .filter(|job| job.is_pending())
            .cloned()
            .collect()
    }

    /// Look up one job. `None` means no job with this id exists.
    pub async fn get_by_id(&self, id: JobId) -> Option<Job> {
        self.jobs.lock().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Insert a new job. Fails if the id is already taken.
    pub async fn append(&self, job: Job) -> Result<(), StoreError> {
        ensure_consistent(&job)?;

        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::DuplicateId(job.id));
        }

        let id = job.id;
        jobs.insert(id, job);
        if let Err(e) = self.persist(&jobs).await {
            jobs.shift_remove(&id);
            return Err(e);
        }
        Ok(())
    }

    /// Insert or replace a job. A replaced job keeps its position.
    ///
    /// A terminal record can only be replaced by one with the same status;
    /// anything else is rejected with [`CoreError::Conflict`] and nothing is
    /// written.
    pub async fn upsert(&self, job: Job) -> Result<(), StoreError> {
        ensure_consistent(&job)?;

        let mut jobs = self.jobs.lock().await;
        let id = job.id;
        if let Some(current) = jobs.get(&id) {
            if current.status.is_terminal() && current.status != job.status {
                return Err(CoreError::Conflict(format!(
                    "job {id} is already {} and cannot become {}",
                    current.status, job.status
                ))
                .into());
            }
        }
        let previous = jobs.insert(id, job);
        if let Err(e) = self.persist(&jobs).await {
            match previous {
                Some(previous) => {
                    jobs.insert(id, previous);
                }
                None => {
                    jobs.shift_remove(&id);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Transactionally replace one job.
    ///
    /// `change` sees the current persisted record and returns its
    /// replacement, or an error to leave the record untouched. Nothing is
    /// written when `change` fails. Returns the stored replacement.
    pub async fn modify<F>(&self, id: JobId, change: F) -> Result<Job, StoreError>
    where
        F: FnOnce(&Job) -> Result<Job, CoreError>,
    {
        let mut jobs = self.jobs.lock().await;
        let current = jobs.get(&id).ok_or(StoreError::NotFound(id))?;

        let next = change(current)?;
        if next.id != id {
            return Err(CoreError::Validation(format!(
                "update of job {id} tried to change its id to {}",
                next.id
            ))
            .into());
        }
        ensure_consistent(&next)?;

        let previous = jobs.insert(id, next.clone());
        if let Err(e) = self.persist(&jobs).await {
            if let Some(previous) = previous {
                jobs.insert(id, previous);
            }
            return Err(e);
        }
        Ok(next)
    }

    /// Write the whole collection durably.
    ///
    /// The document is written to a sibling temp file, synced, then renamed
    /// over the target so readers never see a partial collection.
    async fn persist(&self, jobs: &IndexMap<JobId, Job>) -> Result<(), StoreError> {
        let snapshot: Vec<&Job> = jobs.values().collect();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let tmp_path = temp_path(&self.path);
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await?;
        sync_parent_dir(&self.path).await?;
        tracing::trace!(path = %self.path.display(), count = jobs.len(), "Job store persisted");
        Ok(())
    }
}

fn ensure_consistent(job: &Job) -> Result<(), CoreError> {
    if job.is_consistent() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "job {} has status {} but result {:?}",
            job.id, job.status, job.result
        )))
    }
}

/// Flush the directory entry created by the rename.
#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tokio::fs::File::open(parent).await?.sync_all().await
}

// Directories cannot be opened for syncing here.
#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Parse the persisted document.
///
/// The top level must be a JSON array. Records that do not parse as a job,
/// violate the status/result invariant, or repeat an earlier id are
/// skipped with a warning.
fn decode(bytes: &[u8]) -> Result<IndexMap<JobId, Job>, serde_json::Error> {
    let records: Vec<serde_json::Value> = serde_json::from_slice(bytes)?;
    let mut jobs = IndexMap::with_capacity(records.len());

    for (index, record) in records.into_iter().enumerate() {
        let job: Job = match serde_json::from_value(record) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping unreadable job record");
                continue;
            }
        };
        if !job.is_consistent() {
            tracing::warn!(index, job_id = %job.id, "Skipping job record with inconsistent result");
            continue;
        }
        if jobs.contains_key(&job.id) {
            tracing::warn!(index, job_id = %job.id, "Skipping duplicate job record");
            continue;
        }
        jobs.insert(job.id, job);
    }

    Ok(jobs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
