//! Overlay renderer backed by an external program.

use std::path::Path;
use std::process::Command;

use endecode_fsops::{Anchor, OverlayError, OverlayRenderer};
use tracing::debug;

/// Runs `<program> [args...] <image> <text> <anchor>` for every mark.
///
/// The configured command is split on whitespace; quoting is not supported.
#[derive(Debug, Clone)]
pub(crate) struct CommandOverlayRenderer {
    command: String,
}

impl CommandOverlayRenderer {
    pub(crate) fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl OverlayRenderer for CommandOverlayRenderer {
    fn draw_text(&self, image: &Path, text: &str, anchor: Anchor) -> Result<(), OverlayError> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or("overlay command is empty")?;
        let output = Command::new(program)
            .args(parts)
            .arg(image)
            .arg(text)
            .arg(anchor.as_str())
            .output()?;
        if output.status.success() {
            debug!(image = %image.display(), anchor = %anchor, "overlay command succeeded");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!(
            "overlay command `{program}` exited with {}: {}",
            output.status,
            stderr.trim()
        )
        .into())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn command_receives_image_text_and_anchor() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let script = dir.path().join("overlay.sh");
        fs::write(
            &script,
            "#!/bin/sh\nprintf '%s|%s|%s' \"$1\" \"$2\" \"$3\" > \"$1.args\"\n",
        )?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        let image = dir.path().join("001.jpg");
        fs::write(&image, b"jpeg")?;

        let renderer = CommandOverlayRenderer::new(script.display().to_string());
        renderer
            .draw_text(&image, "007", Anchor::BottomRight)
            .map_err(|err| anyhow::anyhow!(err))?;

        let args = fs::read_to_string(dir.path().join("001.jpg.args"))?;
        assert_eq!(args, format!("{}|007|bottom-right", image.display()));
        Ok(())
    }

    #[test]
    fn failing_command_is_reported() {
        let renderer = CommandOverlayRenderer::new("false");
        let err = renderer.draw_text(Path::new("/tmp/x.jpg"), "t", Anchor::Center);
        assert!(err.is_err_and(|err| err.to_string().contains("`false` exited")));
    }

    #[test]
    fn blank_command_is_rejected() {
        let renderer = CommandOverlayRenderer::new("   ");
        assert!(renderer.draw_text(Path::new("/tmp/x.jpg"), "t", Anchor::Center).is_err());
    }
}
