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

//! Job notification bus for the Endecode engine.
//!
//! The bus provides a typed event enum and sequential identifiers. Internally
//! it uses `tokio::broadcast` with a bounded buffer; publishing never blocks,
//! and when a subscriber falls behind the oldest events are dropped for that
//! subscriber, which then resynchronises from the job store.
//!
//! Layout: `payloads.rs` (event types), `routing.rs` (`EventBus`),
//! `error.rs` (error primitives).

pub mod error;
pub mod payloads;
pub mod routing;

pub use error::{EventBusError, EventBusResult};
pub use payloads::{DEFAULT_CHANNEL_CAPACITY, Event, EventEnvelope, EventId};
pub use routing::{EventBus, EventStream};
