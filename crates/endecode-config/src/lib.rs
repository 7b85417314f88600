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

//! Engine configuration loaded from an optional JSON file and `ENDECODE_*`
//! environment variables.
//!
//! Layout: `model.rs` (typed config model), `defaults.rs` (default values and
//! variable names), `loader.rs` (file + environment layering), `validate.rs`
//! (field validation and parsing helpers), `error.rs` (error types).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use model::EngineConfig;
