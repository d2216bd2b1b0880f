//! In-memory job registry
//!
//! Holds the observable state of every live job. Jobs are never persisted; a
//! finished job stays visible for a grace period and is then evicted.
//!
//! The outer map lock is only held to look an entry up (or insert/remove one).
//! Each entry has its own mutex, so updates to different jobs never contend.
//! Entries also own the job's [`JobChannel`], so eviction releases both.

use crate::error::{Error, JobError, Result};
use crate::hub::JobChannel;
use crate::types::{CredentialContext, JobId, JobInfo, JobStatus, TargetKind};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Live state for one job
#[derive(Debug)]
struct JobEntry {
    info: JobInfo,
    channel: Arc<JobChannel>,
    /// Bumped on every `schedule_eviction`; a timer only fires for the latest value
    eviction_generation: u64,
}

type EntryHandle = Arc<Mutex<JobEntry>>;

/// Events buffered per subscriber when no capacity is configured
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Concurrent map of live jobs (cloneable - shares the underlying map)
#[derive(Clone, Debug)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, EntryHandle>>>,
    subscriber_buffer: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_subscriber_buffer(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl JobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry whose job channels buffer `capacity` events
    pub fn with_subscriber_buffer(capacity: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            subscriber_buffer: capacity.max(1),
        }
    }

    /// Register a new `Pending` job with a fresh id
    pub async fn create(&self, target_kind: TargetKind, source: impl Into<String>) -> JobInfo {
        let info = JobInfo {
            id: JobId::new(),
            target_kind,
            source: source.into(),
            status: JobStatus::Pending,
            current_attempt: None,
            attempts: 0,
            cancelled: false,
            last_progress: None,
            created_at: Utc::now(),
            finished_at: None,
        };

        let entry = JobEntry {
            info: info.clone(),
            channel: Arc::new(JobChannel::new(info.id, self.subscriber_buffer)),
            eviction_generation: 0,
        };
        self.jobs
            .write()
            .await
            .insert(info.id, Arc::new(Mutex::new(entry)));

        tracing::debug!(job_id = %info.id, kind = %target_kind, "job registered");
        info
    }

    /// Snapshot of a job, `None` if unknown or evicted
    pub async fn get(&self, id: JobId) -> Option<JobInfo> {
        let entry = self.entry(id).await?;
        let info = entry.lock().await.info.clone();
        Some(info)
    }

    /// Event channel of a job, `None` if unknown or evicted
    pub async fn channel(&self, id: JobId) -> Option<Arc<JobChannel>> {
        let entry = self.entry(id).await?;
        let channel = Arc::clone(&entry.lock().await.channel);
        Some(channel)
    }

    /// Whether `id` is currently registered
    pub async fn contains(&self, id: JobId) -> bool {
        self.jobs.read().await.contains_key(&id)
    }

    /// Snapshots of all live jobs, oldest first
    pub async fn list(&self) -> Vec<JobInfo> {
        let entries: Vec<EntryHandle> = self.jobs.read().await.values().cloned().collect();

        let mut jobs = Vec::with_capacity(entries.len());
        for entry in entries {
            jobs.push(entry.lock().await.info.clone());
        }
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Number of live jobs
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether the registry holds no jobs
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Move a job to `status`
    ///
    /// Transitions that break the lifecycle (anything out of a terminal state,
    /// `Pending -> Succeeded`, backwards moves) are rejected and logged.
    pub async fn set_status(&self, id: JobId, status: JobStatus) -> Result<()> {
        self.update(id, |info| {
            if !info.status.can_transition_to(status) {
                tracing::warn!(
                    job_id = %id,
                    from = %info.status,
                    to = %status,
                    "rejected illegal job status transition"
                );
                return Err(Error::Job(JobError::InvalidTransition {
                    id,
                    from: info.status,
                    to: status,
                }));
            }

            info.status = status;
            if status.is_terminal() {
                info.finished_at = Some(Utc::now());
            }
            Ok(())
        })
        .await
    }

    /// Record that an attempt with `context` has been spawned
    pub async fn set_attempt(&self, id: JobId, context: CredentialContext) -> Result<()> {
        self.update(id, |info| {
            info.current_attempt = Some(context);
            info.attempts += 1;
            info.last_progress = None;
            Ok(())
        })
        .await
    }

    /// Remember the latest progress percentage for polling clients
    pub async fn record_progress(&self, id: JobId, percentage: f32) -> Result<()> {
        self.update(id, |info| {
            info.last_progress = Some(percentage);
            Ok(())
        })
        .await
    }

    /// Flag a job as cancelled by the user
    pub async fn mark_cancelled(&self, id: JobId) -> Result<()> {
        self.update(id, |info| {
            info.cancelled = true;
            Ok(())
        })
        .await
    }

    /// Remove the job after `delay`
    ///
    /// Scheduling again before the timer fires replaces the earlier timer.
    pub async fn schedule_eviction(&self, id: JobId, delay: Duration) -> Result<()> {
        let entry = self.entry(id).await.ok_or_else(|| Error::job_not_found(id))?;
        let generation = {
            let mut guard = entry.lock().await;
            guard.eviction_generation += 1;
            guard.eviction_generation
        };

        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut map = jobs.write().await;
            let current = match map.get(&id) {
                Some(entry) => entry.lock().await.eviction_generation,
                None => return,
            };
            if current == generation {
                map.remove(&id);
                tracing::debug!(job_id = %id, "job evicted");
            }
        });

        Ok(())
    }

    /// Drop a job immediately
    pub async fn remove(&self, id: JobId) -> Option<JobInfo> {
        let entry = self.jobs.write().await.remove(&id)?;
        let info = entry.lock().await.info.clone();
        Some(info)
    }

    async fn entry(&self, id: JobId) -> Option<EntryHandle> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn update<R>(
        &self,
        id: JobId,
        f: impl FnOnce(&mut JobInfo) -> Result<R>,
    ) -> Result<R> {
        let entry = self.entry(id).await.ok_or_else(|| Error::job_not_found(id))?;
        let mut guard = entry.lock().await;
        f(&mut guard.info)
    }
}
