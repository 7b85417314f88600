//! Argument parsing and command dispatch.

use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand, ValueEnum};
use endecode_config::ConfigLoader;
use endecode_fsops::BatchSettings;
use endecode_telemetry::{
    GlobalContextGuard, LogFormat, LoggingConfig, build_sha, init_logging, log_format_from_str,
};

use crate::commands::{
    handle_add_text, handle_archive, handle_batch, handle_decode, handle_decrypt, handle_encode,
    handle_encrypt, handle_inspect, handle_remove_watermarks,
};
use crate::context::{AppContext, CliError, CliResult};
use crate::output::render_metrics;

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let config = ConfigLoader::from_env()
        .load()
        .map_err(|err| CliError::validation(format!("configuration error: {err}")))?;

    let format = config
        .log_format
        .as_deref()
        .map_or_else(LogFormat::infer, log_format_from_str);
    init_logging(&LoggingConfig {
        level: &config.log_level,
        format,
        build_sha: build_sha(),
    })
    .map_err(|err| CliError::failure(anyhow!("failed to initialise logging: {err}")))?;
    let _context = GlobalContextGuard::new("cli");

    let ctx = AppContext::new(config, cli.output, cli.quiet)?;
    let result = dispatch(cli.command, &ctx).await;
    if cli.metrics {
        render_metrics(&ctx.metrics, ctx.output)?;
    }
    result
}

async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<()> {
    match command {
        Command::Batch(args) => handle_batch(ctx, args).await,
        Command::Encrypt(args) => handle_encrypt(ctx, args).await,
        Command::Decrypt(args) => handle_decrypt(ctx, args).await,
        Command::RemoveWatermarks(args) => handle_remove_watermarks(ctx, args).await,
        Command::AddText(args) => handle_add_text(ctx, args).await,
        Command::Archive(args) => handle_archive(ctx, args).await,
        Command::Inspect(args) => handle_inspect(ctx, &args),
        Command::Encode(args) => handle_encode(ctx, &args),
        Command::Decode(args) => handle_decode(ctx, &args),
    }
}

#[derive(Parser)]
#[command(name = "endecode", about = "Watermark, copy and archive media folders")]
pub(crate) struct Cli {
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(long, global = true, help = "Do not print job progress")]
    pub(crate) quiet: bool,
    #[arg(
        long,
        global = true,
        help = "Print job and pipeline metrics to stderr when the command ends"
    )]
    pub(crate) metrics: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Produce numbered, watermarked copies of a folder.
    Batch(BatchArgs),
    /// Watermark every supported file of a folder with a name.
    Encrypt(EncryptArgs),
    /// Recover watermarks from a folder.
    Decrypt(FolderArgs),
    /// Strip binary watermarks from images and videos.
    RemoveWatermarks(FolderArgs),
    /// Draw visible text on one numbered photo.
    AddText(AddTextArgs),
    /// Package a folder into an uncompressed zip archive.
    Archive(ArchiveArgs),
    /// Show the binary watermark of a single file.
    Inspect(InspectArgs),
    /// Apply the payload cipher to a string.
    Encode(TextArgs),
    /// Reverse the payload cipher.
    Decode(TextArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct BatchArgs {
    /// Source folder.
    pub(crate) path: PathBuf,
    #[arg(long, default_value_t = 1, help = "Number of copies to produce")]
    pub(crate) copies: u32,
    #[arg(
        long,
        default_value = "",
        help = "Watermark text; a trailing number sets the first order number"
    )]
    pub(crate) base_text: String,
    #[arg(long, help = "Swap photos <order> and <order + 10> in every copy")]
    pub(crate) swap: bool,
    #[arg(long, help = "Draw a visible mark on one photo per copy")]
    pub(crate) visible: bool,
    #[arg(long, help = "Zip every copy and remove its folder")]
    pub(crate) zip: bool,
    #[arg(long, help = "Visible mark text (defaults to the order number)")]
    pub(crate) visible_text: Option<String>,
    #[arg(long, help = "Photo number receiving the visible mark")]
    pub(crate) photo_number: Option<u64>,
    #[arg(long, help = "Mark the photo whose number equals the order number")]
    pub(crate) order_as_photo: bool,
    #[arg(long, help = "Archive file name without extension")]
    pub(crate) archive_name: Option<String>,
}

impl BatchArgs {
    pub(crate) fn settings(&self) -> BatchSettings {
        BatchSettings {
            num_copies: self.copies,
            base_text: self.base_text.clone(),
            add_swap: self.swap,
            add_visible_watermark: self.visible,
            create_zip: self.zip,
            visible_watermark_text: self.visible_text.clone(),
            target_photo_number: self.photo_number,
            use_order_number_as_photo_number: self.order_as_photo,
            archive_name: self.archive_name.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct EncryptArgs {
    /// Folder to watermark.
    pub(crate) path: PathBuf,
    #[arg(long, help = "Name embedded into every file")]
    pub(crate) name: String,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct FolderArgs {
    /// Folder to process.
    pub(crate) path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct AddTextArgs {
    /// Folder holding the photo.
    pub(crate) path: PathBuf,
    #[arg(long, help = "Text to draw")]
    pub(crate) text: String,
    #[arg(long, help = "Number of the photo to mark")]
    pub(crate) photo: u64,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ArchiveArgs {
    /// Folder to archive.
    pub(crate) path: PathBuf,
    #[arg(long, help = "Directory receiving the archive (defaults to the folder's parent)")]
    pub(crate) destination: Option<PathBuf>,
    #[arg(long, help = "Archive file name without extension")]
    pub(crate) name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct InspectArgs {
    /// File to inspect.
    pub(crate) file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct TextArgs {
    /// Input text.
    pub(crate) text: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_flags_map_onto_settings() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "endecode",
            "batch",
            "/photos/set",
            "--copies",
            "3",
            "--base-text",
            "Project 001",
            "--swap",
            "--zip",
            "--photo-number",
            "4",
            "--output",
            "json",
            "--metrics",
        ])?;
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.metrics);
        let Command::Batch(args) = cli.command else {
            anyhow::bail!("expected batch command");
        };
        let settings = args.settings();
        assert_eq!(settings.num_copies, 3);
        assert_eq!(settings.base_text, "Project 001");
        assert!(settings.add_swap && settings.create_zip);
        assert!(!settings.add_visible_watermark);
        assert_eq!(settings.target_photo_number, Some(4));
        Ok(())
    }

    #[test]
    fn subcommands_use_kebab_case() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["endecode", "remove-watermarks", "/photos"])?;
        assert!(matches!(cli.command, Command::RemoveWatermarks(_)));
        let cli = Cli::try_parse_from(["endecode", "add-text", "/p", "--text", "x", "--photo", "2"])?;
        assert!(matches!(cli.command, Command::AddText(_)));
        assert!(Cli::try_parse_from(["endecode", "encrypt", "/p"]).is_err());
        Ok(())
    }
}
