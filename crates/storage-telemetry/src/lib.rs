//! Ambient observability for the storage provider runtime: a
//! `tracing-subscriber` init helper and a small `prometheus`-backed
//! [`MetricsRegistry`] tracking request and job counts.
//!
//! Trimmed from the upstream telemetry agent, which also shipped opt-in
//! crash/error reporting and PII anonymization; none of that is part of
//! this runtime's scope, so only the logging and metrics pieces remain.

pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
pub use metrics::MetricsRegistry;
