//! Boundary to the external visible-text renderer.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::OverlayError;

/// Corner or centre the text is anchored to, with the renderer's fixed padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    /// Top-left corner.
    TopLeft,
    /// Top-right corner.
    TopRight,
    /// Image centre.
    Center,
    /// Bottom-left corner.
    BottomLeft,
    /// Bottom-right corner; the batch pipeline always uses this one.
    BottomRight,
}

impl Anchor {
    /// Kebab-case label passed to external renderers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::Center => "center",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Draws semi-transparent white text onto an image file in place.
///
/// Implementations are called from blocking worker threads.
pub trait OverlayRenderer: Send + Sync {
    /// Render `text` onto `image` at `anchor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be decoded or written back.
    fn draw_text(&self, image: &Path, text: &str, anchor: Anchor) -> Result<(), OverlayError>;
}
