//! Synchronous commands that run without the job registry.

use endecode_fsops::{FileKind, decode, encode, extract_watermark_text, has_watermark};
use serde::Serialize;

use crate::cli::{InspectArgs, TextArgs};
use crate::context::{AppContext, CliError, CliResult};
use crate::output::{render_codec, render_inspect};

/// Watermark state of one file.
#[derive(Debug, Serialize)]
pub(crate) struct InspectReport {
    pub(crate) path: String,
    pub(crate) kind: FileKind,
    pub(crate) watermarked: bool,
    pub(crate) encoded: Option<String>,
    pub(crate) decoded: Option<String>,
}

pub(crate) fn inspect_file(args: &InspectArgs) -> CliResult<InspectReport> {
    if !args.file.is_file() {
        return Err(CliError::validation(format!(
            "{} is not an existing file",
            args.file.display()
        )));
    }
    let watermarked = has_watermark(&args.file)?;
    let encoded = if watermarked {
        Some(extract_watermark_text(&args.file)?)
    } else {
        None
    };
    Ok(InspectReport {
        path: args.file.display().to_string(),
        kind: FileKind::of(&args.file),
        watermarked,
        decoded: encoded.as_deref().map(decode),
        encoded,
    })
}

pub(crate) fn handle_inspect(ctx: &AppContext, args: &InspectArgs) -> CliResult<()> {
    let report = inspect_file(args)?;
    render_inspect(&report, ctx.output)
}

pub(crate) fn handle_encode(ctx: &AppContext, args: &TextArgs) -> CliResult<()> {
    render_codec(&args.text, &encode(&args.text), ctx.output)
}

pub(crate) fn handle_decode(ctx: &AppContext, args: &TextArgs) -> CliResult<()> {
    render_codec(&args.text, &decode(&args.text), ctx.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use endecode_fsops::add_watermark;
    use endecode_test_support::fixtures::MediaTree;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn inspect_reports_decoded_binary_watermark() -> TestResult<()> {
        let tree = MediaTree::with_photos("Set", 1)?;
        let photo = tree.path("001.jpg");
        let before = inspect_file(&InspectArgs { file: photo.clone() })
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert!(!before.watermarked);
        assert_eq!(before.decoded, None);

        add_watermark(&photo, &encode("Client 007"))?;
        let after = inspect_file(&InspectArgs { file: photo })
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert!(after.watermarked);
        assert_eq!(after.kind, FileKind::Image);
        assert_eq!(after.decoded.as_deref(), Some("Client 007"));
        Ok(())
    }

    #[test]
    fn inspect_rejects_missing_file() -> TestResult<()> {
        let tree = MediaTree::new("Set")?;
        let err = inspect_file(&InspectArgs {
            file: tree.path("nope.jpg"),
        })
        .err();
        assert_eq!(err.map(|err| err.exit_code()), Some(2));
        Ok(())
    }
}
