//! Job registry: dedup locks, worker supervision and progress fan-out.
//!
//! # Design
//! - One lock entry per `(operation, path)`; a second start on a held lock
//!   returns the owning job id instead of starting new work.
//! - Workers run on the blocking pool; panics surface as `JoinError` and are
//!   recorded as failed jobs.
//! - Subscribers get a snapshot first and live bus events afterwards. A lagging
//!   subscriber is resynchronised from the store instead of stalling workers.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use endecode_events::{Event, EventBus, EventBusError, EventId, EventStream};
use endecode_telemetry::{Metrics, job_span};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinError;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};
use crate::job::{Job, JobStatus, JobSummary, OperationKind, job_key, job_prefix, lock_key};
use crate::store::{KeyValueStore, MemoryStore};

const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Retention settings for job and lock records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// How long finished job records stay readable.
    pub job_ttl: Duration,
    /// Expiry of dedup locks, in case a process dies holding one.
    pub lock_ttl: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            job_ttl: DEFAULT_TTL,
            lock_ttl: DEFAULT_TTL,
        }
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new worker was spawned.
    Started(Uuid),
    /// The same operation already runs on this path.
    Deduplicated(Uuid),
}

impl StartOutcome {
    /// Job the caller should follow.
    #[must_use]
    pub const fn job_id(self) -> Uuid {
        match self {
            Self::Started(id) | Self::Deduplicated(id) => id,
        }
    }

    /// Whether the request collapsed onto an existing job.
    #[must_use]
    pub const fn is_deduplicated(self) -> bool {
        matches!(self, Self::Deduplicated(_))
    }
}

/// Tracks background jobs and enforces one job per `(operation, path)`.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    store: Arc<dyn KeyValueStore>,
    events: EventBus,
    metrics: Metrics,
    config: RegistryConfig,
}

impl JobRegistry {
    /// Registry backed by `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        events: EventBus,
        metrics: Metrics,
        config: RegistryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store,
                events,
                metrics,
                config,
            }),
        }
    }

    /// Registry backed by a [`MemoryStore`]; nothing survives a restart.
    #[must_use]
    pub fn in_memory(events: EventBus, metrics: Metrics, config: RegistryConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), events, metrics, config)
    }

    /// Bus the registry publishes job events on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Start `work` for `operation` on `path` unless one is already running.
    ///
    /// Returns immediately; the work runs on the blocking thread pool and
    /// reports progress through the supplied [`ProgressReporter`].
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a Tokio runtime or when the store
    /// rejects the lock or job record.
    pub fn start<F>(
        &self,
        operation: OperationKind,
        path: &str,
        work: F,
    ) -> RuntimeResult<StartOutcome>
    where
        F: FnOnce(&ProgressReporter) -> anyhow::Result<Value> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?;
        let lock = lock_key(operation, path);
        let id = Uuid::new_v4();
        let owner = id.to_string();

        if let Some(existing) =
            self.inner
                .store
                .set_if_absent(&lock, &owner, Some(self.inner.config.lock_ttl))?
        {
            let existing =
                Uuid::parse_str(&existing).map_err(|_| RuntimeError::MalformedLock {
                    key: lock.clone(),
                    value: existing.clone(),
                })?;
            self.inner.metrics.inc_job_deduplicated(operation.as_str());
            let _ = self.inner.events.publish(Event::JobDeduplicated {
                job_id: existing,
                operation: operation.as_str().to_string(),
                path: path.to_string(),
            });
            info!(job_id = %existing, operation = %operation, path, "job deduplicated");
            return Ok(StartOutcome::Deduplicated(existing));
        }

        let job = Job::new(id, operation, path.to_string());
        if let Err(err) = self.save(&job) {
            if let Err(release) = self.inner.store.delete_if_equals(&lock, &owner) {
                warn!(job_id = %id, error = %release, "failed to release lock after store error");
            }
            return Err(err);
        }

        self.inner.metrics.inc_job_started(operation.as_str());
        let _ = self.inner.events.publish(Event::JobStarted {
            job_id: id,
            operation: operation.as_str().to_string(),
            path: path.to_string(),
        });
        info!(job_id = %id, operation = %operation, path, "job started");

        let registry = self.clone();
        let span = job_span(&owner, operation.as_str(), path);
        drop(handle.spawn(async move {
            let started = Instant::now();
            let reporter = ProgressReporter::new(registry.clone(), id);
            let outcome =
                tokio::task::spawn_blocking(move || span.in_scope(|| work(&reporter))).await;
            registry.finish(id, operation, &lock, outcome, started.elapsed());
        }));
        Ok(StartOutcome::Started(id))
    }

    /// Current record of a job.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds a malformed record.
    pub fn get(&self, id: Uuid) -> RuntimeResult<Option<Job>> {
        let key = job_key(id);
        self.inner
            .store
            .get(&key)?
            .map(|raw| decode_job(&key, &raw))
            .transpose()
    }

    /// Summaries of every retained job, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds a malformed record.
    pub fn list(&self) -> RuntimeResult<Vec<JobSummary>> {
        let mut jobs = Vec::new();
        for key in self.inner.store.keys_with_prefix(job_prefix())? {
            if let Some(raw) = self.inner.store.get(&key)? {
                jobs.push(decode_job(&key, &raw)?.summary());
            }
        }
        jobs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(jobs)
    }

    /// Follow a job: a snapshot first, then live updates until it finishes.
    ///
    /// Returns `None` for unknown jobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read.
    pub fn subscribe(&self, id: Uuid) -> RuntimeResult<Option<JobSubscription>> {
        // Subscribe before reading so no event between the two is lost.
        let stream = self.inner.events.subscribe();
        let Some(job) = self.get(id)? else {
            return Ok(None);
        };
        Ok(Some(JobSubscription {
            registry: self.clone(),
            job_id: id,
            pending: Some(JobUpdate::from(&job)),
            stream,
            last_progress: 0.0,
            last_event: None,
            done: false,
        }))
    }

    /// Wait for a job to reach a final state and return its record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn wait(&self, id: Uuid) -> RuntimeResult<Option<Job>> {
        let Some(mut subscription) = self.subscribe(id)? else {
            return Ok(None);
        };
        while let Some(update) = subscription.next().await {
            if update.status.is_terminal() {
                break;
            }
        }
        self.get(id)
    }

    fn save(&self, job: &Job) -> RuntimeResult<()> {
        let raw = serde_json::to_string(job).map_err(|source| RuntimeError::Encode {
            job_id: job.id,
            source,
        })?;
        self.inner
            .store
            .set(&job_key(job.id), &raw, Some(self.inner.config.job_ttl))?;
        Ok(())
    }

    fn update_progress(&self, id: Uuid, progress: f64) -> RuntimeResult<()> {
        let Some(mut job) = self.get(id)? else {
            return Ok(());
        };
        if job.status != JobStatus::Processing || job.progress >= progress {
            return Ok(());
        }
        job.progress = progress;
        self.save(&job)
    }

    fn finish(
        &self,
        id: Uuid,
        operation: OperationKind,
        lock: &str,
        outcome: Result<anyhow::Result<Value>, JoinError>,
        elapsed: Duration,
    ) {
        let (status, result, message) = match outcome {
            Ok(Ok(value)) => (JobStatus::Completed, Some(value), None),
            Ok(Err(err)) => (JobStatus::Error, None, Some(format!("{err:#}"))),
            Err(err) => (JobStatus::Error, None, Some(describe_join_error(err))),
        };

        match self.get(id) {
            Ok(Some(mut job)) => {
                job.status = status;
                if status == JobStatus::Completed {
                    job.progress = 1.0;
                }
                job.result.clone_from(&result);
                job.error.clone_from(&message);
                job.finished_at = Some(Utc::now());
                if let Err(err) = self.save(&job) {
                    error!(job_id = %id, error = %err, "failed to record job outcome");
                }
            }
            Ok(None) => warn!(job_id = %id, "job record expired before completion"),
            Err(err) => error!(job_id = %id, error = %err, "failed to load job for completion"),
        }

        if let Err(err) = self.inner.store.delete_if_equals(lock, &id.to_string()) {
            warn!(job_id = %id, error = %err, "failed to release job lock");
        }
        self.inner
            .metrics
            .inc_job_finished(operation.as_str(), status.as_str(), elapsed);

        match message {
            None => {
                let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                info!(job_id = %id, operation = %operation, elapsed_ms, "job completed");
                let _ = self
                    .inner
                    .events
                    .publish(Event::JobCompleted { job_id: id, result });
            }
            Some(message) => {
                warn!(job_id = %id, operation = %operation, error = %message, "job failed");
                let _ = self.inner.events.publish(Event::JobFailed {
                    job_id: id,
                    message,
                });
            }
        }
    }
}

fn decode_job(key: &str, raw: &str) -> RuntimeResult<Job> {
    serde_json::from_str(raw).map_err(|source| RuntimeError::Decode {
        key: key.to_string(),
        source,
    })
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return "job worker was cancelled".to_string();
    }
    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("job panicked: {detail}")
}

/// Progress sink handed to a job's work function.
///
/// Values are clamped to `[0, 1]`; anything not above the last reported
/// value is ignored, so observers only ever see progress grow.
pub struct ProgressReporter {
    registry: JobRegistry,
    job_id: Uuid,
    last: Mutex<f64>,
}

impl ProgressReporter {
    const fn new(registry: JobRegistry, job_id: Uuid) -> Self {
        Self {
            registry,
            job_id,
            last: Mutex::new(0.0),
        }
    }

    /// Job this reporter updates.
    #[must_use]
    pub const fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Record `fraction` of the work as done.
    pub fn report(&self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        let value = fraction.clamp(0.0, 1.0);
        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            if value <= *last {
                return;
            }
            *last = value;
        }
        if let Err(err) = self.registry.update_progress(self.job_id, value) {
            warn!(job_id = %self.job_id, error = %err, "failed to store job progress");
        }
        let _ = self.registry.inner.events.publish(Event::JobProgress {
            job_id: self.job_id,
            progress: value,
        });
    }
}

/// Status change observed by a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobUpdate {
    /// Job the update belongs to.
    pub job_id: Uuid,
    /// Status after the change.
    pub status: JobStatus,
    /// Progress after the change.
    pub progress: f64,
    /// Error text for failed jobs.
    pub error: Option<String>,
    /// Result payload for completed jobs.
    pub result: Option<Value>,
}

impl From<&Job> for JobUpdate {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            error: job.error.clone(),
            result: job.result.clone(),
        }
    }
}

/// Stream of updates for one job, ending after the final state.
pub struct JobSubscription {
    registry: JobRegistry,
    job_id: Uuid,
    pending: Option<JobUpdate>,
    stream: EventStream,
    last_progress: f64,
    last_event: Option<EventId>,
    done: bool,
}

impl JobSubscription {
    /// Job being followed.
    #[must_use]
    pub const fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Next update, or `None` once the job has finished.
    pub async fn next(&mut self) -> Option<JobUpdate> {
        if let Some(update) = self.pending.take() {
            return Some(self.emit(update));
        }
        if self.done {
            return None;
        }
        while let Some(item) = self.stream.next().await {
            match item {
                Ok(envelope) => {
                    self.last_event = Some(envelope.id);
                    if envelope.event.job_id() != self.job_id {
                        continue;
                    }
                    debug!(
                        job_id = %self.job_id,
                        event = envelope.event.kind(),
                        "job event received"
                    );
                    if let Some(update) = self.apply(envelope.event) {
                        return Some(self.emit(update));
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    let lag = EventBusError::Lagged {
                        skipped,
                        last_seen: self.last_event,
                    };
                    warn!(job_id = %self.job_id, skipped = lag.skipped(), "{lag}; resynchronising");
                    match self.registry.get(self.job_id) {
                        Ok(Some(job)) => return Some(self.emit(JobUpdate::from(&job))),
                        Ok(None) => {
                            self.done = true;
                            return None;
                        }
                        Err(err) => {
                            warn!(job_id = %self.job_id, error = %err, "failed to refresh job");
                        }
                    }
                }
            }
        }
        None
    }

    fn emit(&mut self, update: JobUpdate) -> JobUpdate {
        if update.status.is_terminal() {
            self.done = true;
        }
        self.last_progress = self.last_progress.max(update.progress);
        update
    }

    fn apply(&self, event: Event) -> Option<JobUpdate> {
        let update = |status, progress, error, result| JobUpdate {
            job_id: self.job_id,
            status,
            progress,
            error,
            result,
        };
        match event {
            Event::JobProgress { progress, .. } if progress > self.last_progress => {
                Some(update(JobStatus::Processing, progress, None, None))
            }
            Event::JobCompleted { result, .. } => {
                Some(update(JobStatus::Completed, 1.0, None, result))
            }
            Event::JobFailed { message, .. } => Some(update(
                JobStatus::Error,
                self.last_progress,
                Some(message),
                None,
            )),
            _ => None,
        }
    }
}
