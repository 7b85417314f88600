//! Shared engine wiring, errors, and source validation for the CLI.

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use endecode_config::EngineConfig;
use endecode_events::EventBus;
use endecode_fsops::{BatchOrchestrator, FsOpsError, OverlayRenderer};
use endecode_runtime::{JobRegistry, RegistryConfig};
use endecode_telemetry::Metrics;

use crate::cli::OutputFormat;
use crate::overlay::CommandOverlayRenderer;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<FsOpsError> for CliError {
    fn from(err: FsOpsError) -> Self {
        if err.is_invalid_input() {
            Self::Validation(err.to_string())
        } else {
            Self::Failure(err.into())
        }
    }
}

/// Engine services shared by command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) config: EngineConfig,
    pub(crate) registry: JobRegistry,
    pub(crate) metrics: Metrics,
    pub(crate) renderer: Option<Arc<dyn OverlayRenderer>>,
    pub(crate) output: OutputFormat,
    pub(crate) quiet: bool,
}

impl AppContext {
    pub(crate) fn new(config: EngineConfig, output: OutputFormat, quiet: bool) -> CliResult<Self> {
        let metrics = Metrics::new()
            .map_err(|err| CliError::failure(anyhow!("failed to initialise metrics: {err}")))?;
        let registry = JobRegistry::in_memory(
            EventBus::with_capacity(config.event_capacity),
            metrics.clone(),
            RegistryConfig {
                job_ttl: config.job_ttl(),
                lock_ttl: config.lock_ttl(),
            },
        );
        let renderer = config.overlay_command.as_deref().map(|command| {
            Arc::new(CommandOverlayRenderer::new(command)) as Arc<dyn OverlayRenderer>
        });
        Ok(Self {
            config,
            registry,
            metrics,
            renderer,
            output,
            quiet,
        })
    }

    /// Batch orchestrator wired with the configured renderer.
    pub(crate) fn orchestrator(&self) -> BatchOrchestrator {
        let orchestrator = BatchOrchestrator::new(self.metrics.clone());
        match &self.renderer {
            Some(renderer) => orchestrator.with_renderer(Arc::clone(renderer)),
            None => orchestrator,
        }
    }

    pub(crate) fn require_renderer(&self) -> CliResult<Arc<dyn OverlayRenderer>> {
        self.renderer.clone().ok_or_else(|| {
            CliError::validation("visible text requires ENDECODE_OVERLAY_COMMAND to be set")
        })
    }

    /// Resolve a source folder and check it against the allow-list.
    pub(crate) fn source_folder(&self, path: &Path) -> CliResult<PathBuf> {
        if !path.is_dir() {
            return Err(CliError::validation(format!(
                "{} is not an existing directory",
                path.display()
            )));
        }
        let resolved = fs::canonicalize(path).map_err(|err| {
            CliError::failure(anyhow!("failed to resolve {}: {err}", path.display()))
        })?;
        if !self.config.is_path_allowed(&resolved) {
            return Err(CliError::validation(format!(
                "{} is outside the allowed source roots",
                resolved.display()
            )));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = anyhow::Result<T>;

    fn context(config: EngineConfig) -> TestResult<AppContext> {
        AppContext::new(config, OutputFormat::Json, true).map_err(|err| anyhow!(err.display_message()))
    }

    #[test]
    fn exit_codes_split_validation_and_failure() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("boom")).exit_code(), 3);
        let chained = CliError::failure(anyhow!("disk full").context("copy failed"));
        assert_eq!(chained.display_message(), "copy failed: disk full");
    }

    #[test]
    fn invalid_input_maps_to_validation() {
        let err = endecode_fsops::ensure_folder(Path::new("/definitely/missing/folder"))
            .err()
            .map(CliError::from);
        assert!(matches!(err, Some(CliError::Validation(_))));
    }

    #[test]
    fn source_folder_enforces_allow_list() -> TestResult<()> {
        let allowed = tempfile::tempdir()?;
        let outside = tempfile::tempdir()?;
        let ctx = context(EngineConfig {
            allow_paths: vec![fs::canonicalize(allowed.path())?],
            ..EngineConfig::default()
        })?;

        assert!(ctx.source_folder(allowed.path()).is_ok());
        let rejected = ctx.source_folder(outside.path()).err();
        assert!(matches!(rejected, Some(CliError::Validation(_))));
        let missing = ctx.source_folder(&PathBuf::from("/definitely/missing")).err();
        assert!(matches!(missing, Some(CliError::Validation(_))));
        Ok(())
    }

    #[test]
    fn renderer_is_required_for_visible_text() -> TestResult<()> {
        let ctx = context(EngineConfig::default())?;
        assert!(matches!(ctx.require_renderer(), Err(CliError::Validation(_))));
        let ctx = context(EngineConfig {
            overlay_command: Some("overlay-tool".into()),
            ..EngineConfig::default()
        })?;
        assert!(ctx.require_renderer().is_ok());
        Ok(())
    }
}
