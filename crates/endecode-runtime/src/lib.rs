#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Background job tracking for the watermark engine.
//!
//! Jobs run on the blocking thread pool, one per `(operation, path)` pair.
//! Job and lock records live behind the [`KeyValueStore`] boundary; the
//! bundled [`MemoryStore`] keeps them in process memory only, so they do not
//! survive a restart. Jobs cannot be cancelled once started.

pub mod error;
pub mod job;
pub mod registry;
pub mod store;

pub use error::{RuntimeError, RuntimeResult, StoreError, StoreResult};
pub use job::{Job, JobStatus, JobSummary, OperationKind};
pub use registry::{
    JobRegistry, JobSubscription, JobUpdate, ProgressReporter, RegistryConfig, StartOutcome,
};
pub use store::{KeyValueStore, MemoryStore};
