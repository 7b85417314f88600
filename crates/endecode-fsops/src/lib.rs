//! Watermarking, batch copy and archive pipeline for media folders.
//!
//! Layout: codec.rs (payload cipher and text wire format), classify.rs (file
//! kinds and numbering), watermark.rs (binary tail markers), policy.rs
//! (per-kind embedding), swap.rs, tree.rs, archive.rs (STORED zip writer),
//! overlay.rs (renderer boundary), batch.rs (copy pipeline), ops.rs
//! (single-shot folder operations).
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

pub mod archive;
pub mod batch;
pub mod classify;
pub mod codec;
pub mod error;
pub mod model;
pub mod ops;
pub mod overlay;
pub mod policy;
pub mod swap;
pub mod tree;
pub mod watermark;

pub use archive::{clean_archive_name, create_folder_archive, entry_name, stream_folder_archive};
pub use batch::BatchOrchestrator;
pub use classify::{FileKind, extract_leading_number, file_number, supported_files};
pub use codec::{decode, encode, extract_and_decode, extract_text, text_watermark};
pub use error::{FsOpsError, FsOpsResult, OverlayError};
pub use model::{
    BatchOutcome, BatchSettings, CopyUnit, DecodedWatermark, RemovalReport, SampleLocator,
    SwapPair, WatermarkRecord,
};
pub use ops::{add_text_to_photo, decrypt_folder, encrypt_folder, ensure_folder, remove_watermarks};
pub use overlay::{Anchor, OverlayRenderer};
pub use policy::{BatchFileWatermarkPolicy, Embedding, TypeAwareWatermarkPolicy, WatermarkPolicy};
pub use swap::{perform_order_swap, swap_files};
pub use tree::copy_tree;
pub use watermark::{add_watermark, extract_watermark_text, has_watermark, remove_watermark};
