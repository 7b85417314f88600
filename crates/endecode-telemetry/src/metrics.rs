//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the job and pipeline counters the engine reports.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the engine.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    jobs_started_total: IntCounterVec,
    jobs_deduplicated_total: IntCounterVec,
    jobs_finished_total: IntCounterVec,
    pipeline_steps_total: IntCounterVec,
    active_jobs: IntGauge,
    last_job_duration_ms: IntGauge,
}

/// Snapshot of selected gauges and counters for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Jobs currently running.
    pub active_jobs: i64,
    /// Wall-clock duration of the most recently finished job (ms).
    pub last_job_duration_ms: i64,
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::Collector { name, source })
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::Collector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Collector { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let jobs_started_total = counter_vec(
            "jobs_started_total",
            "Jobs accepted by operation",
            &["operation"],
        )?;
        let jobs_deduplicated_total = counter_vec(
            "jobs_deduplicated_total",
            "Start requests collapsed onto a running job",
            &["operation"],
        )?;
        let jobs_finished_total = counter_vec(
            "jobs_finished_total",
            "Jobs finished by operation and status",
            &["operation", "status"],
        )?;
        let pipeline_steps_total = counter_vec(
            "pipeline_steps_total",
            "Batch pipeline steps executed by status",
            &["step", "status"],
        )?;
        let active_jobs = gauge("active_jobs", "Jobs currently running")?;
        let last_job_duration_ms = gauge(
            "last_job_duration_ms",
            "Duration of the most recently finished job (ms)",
        )?;

        register(&registry, "jobs_started_total", &jobs_started_total)?;
        register(&registry, "jobs_deduplicated_total", &jobs_deduplicated_total)?;
        register(&registry, "jobs_finished_total", &jobs_finished_total)?;
        register(&registry, "pipeline_steps_total", &pipeline_steps_total)?;
        register(&registry, "active_jobs", &active_jobs)?;
        register(&registry, "last_job_duration_ms", &last_job_duration_ms)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                jobs_started_total,
                jobs_deduplicated_total,
                jobs_finished_total,
                pipeline_steps_total,
                active_jobs,
                last_job_duration_ms,
            }),
        })
    }

    /// Record an accepted job and bump the active gauge.
    pub fn inc_job_started(&self, operation: &str) {
        self.inner
            .jobs_started_total
            .with_label_values(&[operation])
            .inc();
        self.inner.active_jobs.inc();
    }

    /// Record a start request that collapsed onto a running job.
    pub fn inc_job_deduplicated(&self, operation: &str) {
        self.inner
            .jobs_deduplicated_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Record a finished job and drop the active gauge.
    pub fn inc_job_finished(&self, operation: &str, status: &str, elapsed: Duration) {
        self.inner
            .jobs_finished_total
            .with_label_values(&[operation, status])
            .inc();
        self.inner.active_jobs.dec();
        self.inner
            .last_job_duration_ms
            .set(Self::duration_to_ms(elapsed));
    }

    /// Increment the batch pipeline step counter.
    pub fn inc_pipeline_step(&self, step: &str, status: &str) {
        self.inner
            .pipeline_steps_total
            .with_label_values(&[step, status])
            .inc();
    }

    /// Accepted-job count for one operation.
    #[must_use]
    pub fn jobs_started(&self, operation: &str) -> u64 {
        self.inner
            .jobs_started_total
            .with_label_values(&[operation])
            .get()
    }

    /// Deduplicated start requests for one operation.
    #[must_use]
    pub fn jobs_deduplicated(&self, operation: &str) -> u64 {
        self.inner
            .jobs_deduplicated_total
            .with_label_values(&[operation])
            .get()
    }

    /// Finished-job count for one operation and status.
    #[must_use]
    pub fn jobs_finished(&self, operation: &str, status: &str) -> u64 {
        self.inner
            .jobs_finished_total
            .with_label_values(&[operation, status])
            .get()
    }

    /// Step count for one pipeline step and status.
    #[must_use]
    pub fn pipeline_steps(&self, step: &str, status: &str) -> u64 {
        self.inner
            .pipeline_steps_total
            .with_label_values(&[step, status])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_jobs: self.inner.active_jobs.get(),
            last_job_duration_ms: self.inner.last_job_duration_ms.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_job_started("batch");
        metrics.inc_job_started("encrypt");
        metrics.inc_job_deduplicated("batch");
        metrics.inc_job_finished("batch", "completed", Duration::from_millis(120));
        metrics.inc_pipeline_step("copy", "completed");
        metrics.inc_pipeline_step("copy", "completed");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_jobs, 1);
        assert_eq!(snapshot.last_job_duration_ms, 120);
        assert_eq!(metrics.jobs_started("batch"), 1);
        assert_eq!(metrics.jobs_deduplicated("batch"), 1);
        assert_eq!(metrics.jobs_finished("batch", "completed"), 1);
        assert_eq!(metrics.pipeline_steps("copy", "completed"), 2);

        let rendered = metrics.render()?;
        assert!(rendered.contains("jobs_started_total"));
        assert!(rendered.contains("pipeline_steps_total"));
        Ok(())
    }
}
