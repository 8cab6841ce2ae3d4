//! Prometheus metrics registry: request counts and job counts for the
//! provider runtime, trimmed from the upstream sync-engine registry down to
//! what this runtime actually tracks.

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

/// Central metrics registry holding the runtime's Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Counter: IPC requests by (method, status).
    pub requests_total: IntCounterVec,
    /// Gauge: jobs currently in flight by kind (upload, download).
    pub jobs_active: IntGaugeVec,
    /// Counter: jobs that reached a terminal state, by (kind, outcome).
    pub jobs_total: IntCounterVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("storage_framework".to_string()), None)?;

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Total IPC requests by method and status"),
            &["method", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let jobs_active = IntGaugeVec::new(
            Opts::new("jobs_active", "Jobs currently in flight by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(jobs_active.clone()))?;

        let jobs_total = IntCounterVec::new(
            Opts::new("jobs_total", "Jobs that reached a terminal state, by kind and outcome"),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(jobs_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            jobs_active,
            jobs_total,
        })
    }

    /// Records the outcome of one IPC request.
    pub fn record_request(&self, method: &str, status: &str) {
        self.requests_total.with_label_values(&[method, status]).inc();
    }

    /// Marks a job of `kind` ("upload"/"download") as started.
    pub fn job_started(&self, kind: &str) {
        self.jobs_active.with_label_values(&[kind]).inc();
    }

    /// Marks a job of `kind` as having reached a terminal `outcome`
    /// ("finished"/"cancelled"/"error").
    pub fn job_finished(&self, kind: &str, outcome: &str) {
        self.jobs_active.with_label_values(&[kind]).dec();
        self.jobs_total.with_label_values(&[kind, outcome]).inc();
    }

    /// Encodes all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
