//! Event bus error primitives.

use crate::payloads::EventId;
use std::fmt::{self, Display, Formatter};

/// Error emitted when a subscriber cannot keep up with the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBusError {
    /// The subscriber fell behind and events were skipped.
    Lagged {
        /// Number of events skipped for this subscriber.
        skipped: u64,
        /// Last event identifier delivered before the gap, if any.
        last_seen: Option<EventId>,
    },
}

impl EventBusError {
    /// Number of events the subscriber missed.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        match self {
            Self::Lagged { skipped, .. } => *skipped,
        }
    }

    /// Last event delivered before the gap.
    #[must_use]
    pub const fn last_seen(&self) -> Option<EventId> {
        match self {
            Self::Lagged { last_seen, .. } => *last_seen,
        }
    }
}

impl Display for EventBusError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("event subscriber lagged")
    }
}

impl std::error::Error for EventBusError {}

/// Result wrapper for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_error_exposes_fields() {
        let err = EventBusError::Lagged {
            skipped: 42,
            last_seen: Some(7),
        };

        assert_eq!(err.skipped(), 42);
        assert_eq!(err.last_seen(), Some(7));
        assert_eq!(err.to_string(), "event subscriber lagged");
    }
}
