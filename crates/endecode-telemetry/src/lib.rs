#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    unreachable_pub,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the Endecode workspace.
//!
//! This crate centralises logging and metrics so the engine, job runtime, and
//! command-line surface adopt a consistent observability story.
//!
//! Layout: `init.rs` (subscriber installation), `context.rs` (application and
//! job spans), `metrics.rs` (Prometheus registry), `error.rs` (error types).

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{GlobalContextGuard, job_span};
pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging, log_format_from_str,
};
pub use metrics::{Metrics, MetricsSnapshot};
