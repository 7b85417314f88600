//! Command handlers grouped by concern.

mod follow;
mod inspect;
mod jobs;

pub(crate) use inspect::{InspectReport, handle_decode, handle_encode, handle_inspect};
pub(crate) use jobs::{
    handle_add_text, handle_archive, handle_batch, handle_decrypt, handle_encrypt,
    handle_remove_watermarks,
};
