//! Error types for telemetry operations.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use prometheus::Error as PrometheusError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing logging or maintaining the metrics registry.
#[derive(Debug)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// A job or pipeline collector could not be created or registered.
    Collector {
        /// Metric name tied to the failure.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The registry could not be rendered in the text exposition format.
    Render {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberInstall { .. } => {
                formatter.write_str("failed to install tracing subscriber")
            }
            Self::Collector { name, .. } => {
                write!(formatter, "failed to set up metrics collector `{name}`")
            }
            Self::Render { .. } => formatter.write_str("failed to render metrics"),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SubscriberInstall { source } => Some(source),
            Self::Collector { source, .. } | Self::Render { source } => Some(source),
        }
    }
}
