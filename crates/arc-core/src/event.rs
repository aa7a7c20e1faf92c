// ── Reconcile events ──
//
// Lifecycle notifications emitted while a device is reconciled. The
// engine only knows the `EventSink` trait; the default sink turns events
// into structured `tracing` records, tests collect them in memory.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReconcileEvent {
    FetchRetrying {
        device: String,
        attempt: u32,
        reason: String,
    },
    Planned {
        device: String,
        operations: usize,
    },
    OperationStarted {
        device: String,
        operation: String,
        index: usize,
        total: usize,
    },
    OperationRetrying {
        device: String,
        operation: String,
        attempt: u32,
        reason: String,
        delay_ms: u64,
    },
    OperationApplied {
        device: String,
        operation: String,
        attempts: u32,
    },
    OperationFailed {
        device: String,
        operation: String,
        reason: String,
    },
    RollbackInitiated {
        device: String,
        operations: usize,
        transactional: bool,
    },
    OperationRolledBack {
        device: String,
        operation: String,
    },
    RollbackFailed {
        device: String,
        operation: String,
        reason: String,
    },
    Cancelled {
        device: String,
        remaining: usize,
    },
}

impl ReconcileEvent {
    pub fn device(&self) -> &str {
        match self {
            Self::FetchRetrying { device, .. }
            | Self::Planned { device, .. }
            | Self::OperationStarted { device, .. }
            | Self::OperationRetrying { device, .. }
            | Self::OperationApplied { device, .. }
            | Self::OperationFailed { device, .. }
            | Self::RollbackInitiated { device, .. }
            | Self::OperationRolledBack { device, .. }
            | Self::RollbackFailed { device, .. }
            | Self::Cancelled { device, .. } => device,
        }
    }

    pub(crate) fn retry_delay(delay: Duration) -> u64 {
        u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Receiver of reconcile events. Shared between device tasks.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ReconcileEvent);
}

// ── TracingSink ─────────────────────────────────────────────────────

/// Default sink: one structured `tracing` record per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &ReconcileEvent) {
        match event {
            ReconcileEvent::FetchRetrying {
                device,
                attempt,
                reason,
            } => warn!(%device, attempt, %reason, "fetch failed, retrying"),
            ReconcileEvent::Planned { device, operations } => {
                info!(%device, operations, "change set planned");
            }
            ReconcileEvent::OperationStarted {
                device,
                operation,
                index,
                total,
            } => debug!(%device, %operation, step = index + 1, total, "operation started"),
            ReconcileEvent::OperationRetrying {
                device,
                operation,
                attempt,
                reason,
                delay_ms,
            } => warn!(%device, %operation, attempt, %reason, delay_ms, "operation retrying"),
            ReconcileEvent::OperationApplied {
                device,
                operation,
                attempts,
            } => info!(%device, %operation, attempts, "operation applied"),
            ReconcileEvent::OperationFailed {
                device,
                operation,
                reason,
            } => warn!(%device, %operation, %reason, "operation failed"),
            ReconcileEvent::RollbackInitiated {
                device,
                operations,
                transactional,
            } => warn!(%device, operations, transactional, "rollback initiated"),
            ReconcileEvent::OperationRolledBack { device, operation } => {
                info!(%device, %operation, "operation rolled back");
            }
            ReconcileEvent::RollbackFailed {
                device,
                operation,
                reason,
            } => warn!(%device, %operation, %reason, "rollback failed"),
            ReconcileEvent::Cancelled { device, remaining } => {
                warn!(%device, remaining, "reconciliation cancelled");
            }
        }
    }
}

// ── RecordingSink ───────────────────────────────────────────────────

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ReconcileEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReconcileEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &ReconcileEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(&ReconcileEvent::Planned {
            device: "sw1".into(),
            operations: 2,
        });
        sink.emit(&ReconcileEvent::Cancelled {
            device: "sw1".into(),
            remaining: 2,
        });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], ReconcileEvent::Cancelled { .. }));
        assert_eq!(events[0].device(), "sw1");
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(ReconcileEvent::OperationApplied {
            device: "sw1".into(),
            operation: "create vlan:10".into(),
            attempts: 1,
        })
        .unwrap_or_default();
        assert_eq!(json["event"], "operation_applied");
    }
}
