// ── Apply / transaction coordinator ──
//
// Executes an ordered change set against one device, strictly in order.
// Recoverable failures are retried with backoff. The first terminal
// failure stops the run: the remainder is skipped and the applied prefix
// is undone, through a native transaction when the device has one and
// through compensating operations otherwise.
//
// Cancellation is observed between operations only. A submitted operation
// (retries included) always reaches a terminal outcome, and rollback is
// never interrupted.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::device::DeviceProtocol;
use crate::error::DeviceError;
use crate::event::{EventSink, ReconcileEvent};
use crate::model::{ApplyResult, ChangeSet, ConfigSnapshot, Operation, OperationReport};
use crate::retry::RetryPolicy;

/// What happened to every operation of one change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub operations: Vec<OperationReport>,
    /// The run was wrapped in a native device transaction.
    pub transactional: bool,
    /// Cancellation stopped the run before every operation was submitted.
    pub cancelled: bool,
    /// A rollback (abort or compensation) was attempted.
    pub rolled_back: bool,
    /// Why the change set was never started; nothing was submitted.
    pub not_started: Option<String>,
}

impl ApplyReport {
    pub fn all_applied(&self) -> bool {
        self.operations.iter().all(|r| r.result.is_applied())
    }

    pub fn count(&self, label: &str) -> usize {
        self.operations
            .iter()
            .filter(|r| r.result.label() == label)
            .count()
    }
}

pub struct ApplyCoordinator<'a> {
    device: &'a mut dyn DeviceProtocol,
    policy: &'a RetryPolicy,
    sink: &'a dyn EventSink,
    cancel: &'a CancellationToken,
    rollback: bool,
    name: String,
}

impl<'a> ApplyCoordinator<'a> {
    pub fn new(
        device: &'a mut dyn DeviceProtocol,
        policy: &'a RetryPolicy,
        sink: &'a dyn EventSink,
        cancel: &'a CancellationToken,
    ) -> Self {
        let name = device.name().to_owned();
        Self {
            device,
            policy,
            sink,
            cancel,
            rollback: true,
            name,
        }
    }

    /// Disable compensation on non-transactional devices; applied
    /// operations are then retained and reported as such.
    pub fn rollback(mut self, enabled: bool) -> Self {
        self.rollback = enabled;
        self
    }

    /// Apply `change_set`, planned against `live`.
    pub async fn apply(mut self, change_set: &ChangeSet, live: &ConfigSnapshot) -> ApplyReport {
        let transactional = self.device.supports_transactions();
        let mut report = ApplyReport {
            operations: Vec::with_capacity(change_set.len()),
            transactional,
            cancelled: false,
            rolled_back: false,
            not_started: None,
        };
        if change_set.is_empty() {
            return report;
        }

        if transactional {
            if let Err(e) = self.device.begin_transaction().await {
                let reason = format!("transaction could not be opened: {e}");
                report.operations = change_set
                    .iter()
                    .map(|op| skipped(op, &reason))
                    .collect();
                report.not_started = Some(reason);
                return report;
            }
        }

        let total = change_set.len();
        let mut failed = false;
        for (index, op) in change_set.iter().enumerate() {
            if failed {
                report.operations.push(skipped(op, "an earlier operation failed"));
                continue;
            }
            if report.cancelled || self.cancel.is_cancelled() {
                if !report.cancelled {
                    report.cancelled = true;
                    self.sink.emit(&ReconcileEvent::Cancelled {
                        device: self.name.clone(),
                        remaining: total - index,
                    });
                }
                report.operations.push(skipped(op, "cancelled"));
                continue;
            }

            self.sink.emit(&ReconcileEvent::OperationStarted {
                device: self.name.clone(),
                operation: op.to_string(),
                index,
                total,
            });
            let (outcome, attempts) = self.submit(op).await;
            let result = match outcome {
                Ok(()) => {
                    self.sink.emit(&ReconcileEvent::OperationApplied {
                        device: self.name.clone(),
                        operation: op.to_string(),
                        attempts,
                    });
                    ApplyResult::Applied
                }
                Err(e) => {
                    failed = true;
                    self.sink.emit(&ReconcileEvent::OperationFailed {
                        device: self.name.clone(),
                        operation: op.to_string(),
                        reason: e.to_string(),
                    });
                    ApplyResult::Failed(e.to_string())
                }
            };
            report.operations.push(OperationReport {
                operation: op.clone(),
                result,
                attempts,
            });
        }

        if transactional {
            if failed || report.cancelled {
                self.abort(&mut report).await;
            } else {
                self.commit(&mut report).await;
            }
        } else if failed && self.rollback {
            self.compensate(&mut report, live).await;
        }
        report
    }

    /// Send `op` until it succeeds, fails terminally or exhausts the
    /// retry budget. Returns the outcome and the number of requests sent.
    async fn submit(&mut self, op: &Operation) -> (Result<(), DeviceError>, u32) {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.device.apply_operation(op).await {
                Ok(()) => return (Ok(()), attempt),
                Err(e) if self.policy.should_retry(attempt, &e) => {
                    let delay = self.policy.backoff(attempt - 1);
                    self.sink.emit(&ReconcileEvent::OperationRetrying {
                        device: self.name.clone(),
                        operation: op.to_string(),
                        attempt,
                        reason: e.to_string(),
                        delay_ms: ReconcileEvent::retry_delay(delay),
                    });
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }

    // ── Native transactions ──────────────────────────────────────────

    async fn commit(&mut self, report: &mut ApplyReport) {
        if let Err(e) = self.device.commit().await {
            let reason = format!("transaction commit failed: {e}");
            for entry in &mut report.operations {
                if entry.result.is_applied() {
                    self.sink.emit(&ReconcileEvent::OperationFailed {
                        device: self.name.clone(),
                        operation: entry.operation.to_string(),
                        reason: reason.clone(),
                    });
                    entry.result = ApplyResult::Failed(reason.clone());
                }
            }
        }
    }

    async fn abort(&mut self, report: &mut ApplyReport) {
        report.rolled_back = true;
        self.sink.emit(&ReconcileEvent::RollbackInitiated {
            device: self.name.clone(),
            operations: report.count("applied"),
            transactional: true,
        });

        let outcome = self.device.abort().await;
        for entry in &mut report.operations {
            if !entry.result.is_applied() {
                continue;
            }
            let operation = entry.operation.to_string();
            match &outcome {
                Ok(()) => {
                    self.sink.emit(&ReconcileEvent::OperationRolledBack {
                        device: self.name.clone(),
                        operation,
                    });
                    entry.result = ApplyResult::RolledBack;
                }
                Err(e) => {
                    let reason = format!("transaction abort failed: {e}");
                    self.sink.emit(&ReconcileEvent::RollbackFailed {
                        device: self.name.clone(),
                        operation,
                        reason: reason.clone(),
                    });
                    entry.result = ApplyResult::Failed(reason);
                }
            }
        }
    }

    // ── Compensation ─────────────────────────────────────────────────

    /// Undo every applied operation, most recent first.
    async fn compensate(&mut self, report: &mut ApplyReport, live: &ConfigSnapshot) {
        let applied: Vec<usize> = report
            .operations
            .iter()
            .enumerate()
            .filter(|(_, r)| r.result.is_applied())
            .map(|(i, _)| i)
            .collect();
        if applied.is_empty() {
            return;
        }

        report.rolled_back = true;
        self.sink.emit(&ReconcileEvent::RollbackInitiated {
            device: self.name.clone(),
            operations: applied.len(),
            transactional: false,
        });

        for &i in applied.iter().rev() {
            let Some(entry) = report.operations.get_mut(i) else {
                continue;
            };
            let operation = entry.operation.to_string();
            let outcome = match entry.operation.compensation(live) {
                Some(undo) => self.submit(&undo).await.0.map_err(|e| e.to_string()),
                None => Err("no compensating operation".to_owned()),
            };
            entry.result = match outcome {
                Ok(()) => {
                    self.sink.emit(&ReconcileEvent::OperationRolledBack {
                        device: self.name.clone(),
                        operation,
                    });
                    ApplyResult::RolledBack
                }
                Err(reason) => {
                    let reason = format!("rollback failed: {reason}");
                    self.sink.emit(&ReconcileEvent::RollbackFailed {
                        device: self.name.clone(),
                        operation,
                        reason: reason.clone(),
                    });
                    ApplyResult::Failed(reason)
                }
            };
        }
    }
}

fn skipped(op: &Operation, reason: &str) -> OperationReport {
    OperationReport {
        operation: op.clone(),
        result: ApplyResult::Skipped(reason.to_owned()),
        attempts: 0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::device::{Fault, MemoryDevice};
    use crate::event::RecordingSink;
    use crate::model::{ConfigEntity, EntityKey, EntityKind, Properties, PropertyValue};

    fn vlan(id: i64) -> ConfigEntity {
        let mut props = Properties::new();
        props.insert("name".into(), format!("v{id}").into());
        ConfigEntity::normalized(EntityKind::Vlan, id.to_string(), props, [])
    }

    fn port(id: &str, untagged: i64) -> ConfigEntity {
        let mut props = Properties::new();
        props.insert("untagged_vlan".into(), PropertyValue::Int(untagged));
        ConfigEntity::normalized(EntityKind::Interface, id, props, [])
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        }
    }

    fn results(report: &ApplyReport) -> Vec<&'static str> {
        report.operations.iter().map(|r| r.result.label()).collect()
    }

    async fn run(
        dev: &mut MemoryDevice,
        ops: Vec<Operation>,
        rollback: bool,
        sink: &RecordingSink,
    ) -> ApplyReport {
        let live = dev.snapshot();
        let cancel = CancellationToken::new();
        let retry = policy();
        ApplyCoordinator::new(dev, &retry, sink, &cancel)
            .rollback(rollback)
            .apply(&ChangeSet::new("sw1", ops), &live)
            .await
    }

    #[tokio::test]
    async fn applies_in_order() {
        let mut dev = MemoryDevice::new("sw1");
        let sink = RecordingSink::new();
        let ops = vec![Operation::create(vlan(10)), Operation::create(port("1", 10))];

        let report = run(&mut dev, ops, true, &sink).await;

        assert!(report.all_applied());
        assert_eq!(dev.journal(), vec!["create vlan:10", "create interface:1"]);
        assert_eq!(dev.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn failure_rolls_back_applied_prefix() {
        let mut dev = MemoryDevice::new("sw1")
            .with_entities([vlan(20)])
            .fail_on("create", EntityKey::vlan(10), Fault::Reject("VLAN table full".into()));
        let sink = RecordingSink::new();
        let mut rename = Properties::new();
        rename.insert("name".into(), "uplink".into());
        let ops = vec![
            Operation::update(EntityKind::Vlan, "20", rename),
            Operation::create(vlan(10)),
            Operation::create(port("1", 10)),
        ];

        let report = run(&mut dev, ops, true, &sink).await;

        assert_eq!(results(&report), vec!["rolled back", "failed", "skipped"]);
        assert!(report.rolled_back);
        assert_eq!(
            report.operations[1].result.reason(),
            Some("rejected by device: VLAN table full")
        );
        // VLAN 20 got its old name back.
        assert_eq!(dev.snapshot().get(&EntityKey::vlan(20)), Some(&vlan(20)));
        assert!(sink.events().iter().any(|e| matches!(
            e,
            ReconcileEvent::RollbackInitiated {
                operations: 1,
                transactional: false,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn failure_without_rollback_retains_applied() {
        let mut dev = MemoryDevice::new("sw1")
            .fail_on("create", EntityKey::vlan(20), Fault::Reject("no".into()));
        let sink = RecordingSink::new();
        let ops = vec![Operation::create(vlan(10)), Operation::create(vlan(20))];

        let report = run(&mut dev, ops, false, &sink).await;

        assert_eq!(results(&report), vec!["applied", "failed"]);
        assert!(!report.rolled_back);
        assert!(dev.snapshot().contains(&EntityKey::vlan(10)));
    }

    #[tokio::test]
    async fn failed_compensation_is_reported() {
        let mut dev = MemoryDevice::new("sw1")
            .fail_on("delete", EntityKey::vlan(10), Fault::Reject("locked".into()))
            .fail_on("create", EntityKey::vlan(20), Fault::Reject("no".into()));
        let sink = RecordingSink::new();
        let ops = vec![Operation::create(vlan(10)), Operation::create(vlan(20))];

        let report = run(&mut dev, ops, true, &sink).await;

        assert_eq!(
            report.operations[0].result,
            ApplyResult::Failed("rollback failed: rejected by device: locked".into())
        );
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, ReconcileEvent::RollbackFailed { .. })));
    }

    #[tokio::test]
    async fn transaction_is_aborted_on_failure() {
        let mut dev = MemoryDevice::new("sw1")
            .transactional()
            .fail_on("create", EntityKey::vlan(20), Fault::Reject("no".into()));
        let sink = RecordingSink::new();
        let ops = vec![Operation::create(vlan(10)), Operation::create(vlan(20))];

        let report = run(&mut dev, ops, true, &sink).await;

        assert!(report.transactional);
        assert_eq!(results(&report), vec!["rolled back", "failed"]);
        assert!(dev.snapshot().is_empty());
        assert_eq!(
            dev.journal(),
            vec!["begin", "create vlan:10", "create vlan:20", "abort"]
        );
    }

    #[tokio::test]
    async fn transaction_commits_on_success() {
        let mut dev = MemoryDevice::new("sw1").transactional();
        let report = run(&mut dev, vec![Operation::create(vlan(10))], true, &RecordingSink::new()).await;

        assert!(report.all_applied());
        assert_eq!(dev.journal().last().map(String::as_str), Some("commit"));
        assert_eq!(dev.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn commit_failure_fails_applied_operations() {
        let mut dev = MemoryDevice::new("sw1")
            .transactional()
            .fail_commit(DeviceError::Rejected("config locked".into()));
        let report = run(&mut dev, vec![Operation::create(vlan(10))], true, &RecordingSink::new()).await;

        assert_eq!(
            report.operations[0].result,
            ApplyResult::Failed("transaction commit failed: rejected by device: config locked".into())
        );
        assert!(dev.snapshot().is_empty());
    }

    #[tokio::test]
    async fn unopened_transaction_submits_nothing() {
        let mut dev = MemoryDevice::new("sw1")
            .transactional()
            .fail_begin(DeviceError::Rejected("config locked".into()));
        let report = run(&mut dev, vec![Operation::create(vlan(10))], true, &RecordingSink::new()).await;

        assert_eq!(results(&report), vec!["skipped"]);
        assert_eq!(
            report.not_started.as_deref(),
            Some("transaction could not be opened: rejected by device: config locked")
        );
        assert!(dev.journal().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn busy_device_is_retried() {
        let mut dev = MemoryDevice::new("sw1")
            .fail_on("create", EntityKey::vlan(10), Fault::Busy(2));
        let sink = RecordingSink::new();

        let report = run(&mut dev, vec![Operation::create(vlan(10))], true, &sink).await;

        assert!(report.all_applied());
        assert_eq!(report.operations[0].attempts, 3);
        let retries: Vec<u32> = sink
            .events()
            .iter()
            .filter_map(|e| match e {
                ReconcileEvent::OperationRetrying { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(retries, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_fails_the_operation() {
        let mut dev = MemoryDevice::new("sw1")
            .fail_on("create", EntityKey::vlan(10), Fault::Busy(10));
        let report = run(&mut dev, vec![Operation::create(vlan(10))], true, &RecordingSink::new()).await;

        assert_eq!(results(&report), vec!["failed"]);
        assert_eq!(report.operations[0].attempts, 4);
    }

    #[tokio::test]
    async fn unauthenticated_is_never_retried() {
        let mut dev = MemoryDevice::new("sw1")
            .fail_on("create", EntityKey::vlan(10), Fault::Unauthenticated);
        let report = run(&mut dev, vec![Operation::create(vlan(10))], true, &RecordingSink::new()).await;

        assert_eq!(report.operations[0].attempts, 1);
        assert!(matches!(
            &report.operations[0].result,
            ApplyResult::Failed(reason) if reason.starts_with("not authenticated")
        ));
        assert_eq!(dev.journal().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_skips_remaining_and_keeps_applied() {
        let mut dev = MemoryDevice::new("sw1");
        let sink = RecordingSink::new();
        let live = dev.snapshot();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let retry = policy();

        let report = ApplyCoordinator::new(&mut dev, &retry, &sink, &cancel)
            .apply(
                &ChangeSet::new("sw1", vec![Operation::create(vlan(10)), Operation::create(vlan(20))]),
                &live,
            )
            .await;

        assert!(report.cancelled);
        assert_eq!(results(&report), vec!["skipped", "skipped"]);
        assert_eq!(report.operations[1].result.reason(), Some("cancelled"));
        assert!(dev.journal().is_empty());
        assert!(matches!(
            sink.events().as_slice(),
            [ReconcileEvent::Cancelled { remaining: 2, .. }]
        ));
    }
}
