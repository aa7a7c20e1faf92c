// ── Reconciler ──
//
// Drives the full pipeline for each device: validate -> fetch -> diff ->
// order -> apply. Devices run as independent tokio tasks; nothing that
// happens on one device (error, panic, cancellation point) reaches another.
// Every device yields a `DeviceReport`, so the caller always gets per-device
// attribution.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::apply::ApplyCoordinator;
use crate::device::DeviceProtocol;
use crate::diff::diff;
use crate::error::{FetchError, ReconcileError, Stage, ValidationError};
use crate::event::{EventSink, ReconcileEvent, TracingSink};
use crate::fetch::fetch_live;
use crate::model::{ChangeSet, ConfigSnapshot, EntityKind, OperationReport};
use crate::order::order;
use crate::retry::RetryPolicy;

// ── Options ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub retry: RetryPolicy,
    /// Compensate applied operations after a failure on devices without
    /// native transactions.
    pub rollback: bool,
    /// Entity kinds under management. Live entities of other kinds are
    /// left alone (but still protect their dependencies from deletion).
    pub kinds: Vec<EntityKind>,
    /// Cancel the whole run after this long.
    pub deadline: Option<Duration>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            rollback: true,
            kinds: EntityKind::all(),
            deadline: None,
        }
    }
}

// ── Reports ─────────────────────────────────────────────────────────

/// Fetched live state and the change set that converges it.
#[derive(Debug, Clone)]
pub struct Plan {
    pub live: ConfigSnapshot,
    pub change_set: ChangeSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceOutcome {
    /// Every operation applied (possibly none were needed).
    Success,
    /// Writes were attempted and at least one did not stick.
    PartialFailure,
    /// The run ended before any write.
    Aborted { stage: Stage, reason: String },
    /// Cancellation stopped the run; see the operations for what remained.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub device: String,
    #[serde(flatten)]
    pub outcome: DeviceOutcome,
    pub transactional: bool,
    pub operations: Vec<OperationReport>,
}

impl DeviceReport {
    /// A device that failed before any write.
    pub fn aborted(device: impl Into<String>, err: &ReconcileError) -> Self {
        let outcome = match err {
            ReconcileError::Cancelled | ReconcileError::Fetch(FetchError::Cancelled { .. }) => {
                DeviceOutcome::Cancelled
            }
            other => DeviceOutcome::Aborted {
                stage: other.stage(),
                reason: other.to_string(),
            },
        };
        Self {
            device: device.into(),
            outcome,
            transactional: false,
            operations: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == DeviceOutcome::Success
    }

    /// Failed before writing anything.
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, DeviceOutcome::Aborted { .. })
    }

    pub fn count(&self, label: &str) -> usize {
        self.operations
            .iter()
            .filter(|r| r.result.label() == label)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every device converged.
    AllApplied,
    /// Some devices (or operations) did not converge.
    Partial,
    /// Every device failed before any write.
    Total,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub devices: Vec<DeviceReport>,
}

impl ReconcileReport {
    pub fn status(&self) -> RunStatus {
        if self.devices.iter().all(DeviceReport::is_success) {
            RunStatus::AllApplied
        } else if self.devices.iter().all(DeviceReport::is_aborted) {
            RunStatus::Total
        } else {
            RunStatus::Partial
        }
    }
}

/// One device to reconcile: an owned handle plus its validated (or
/// rejected) desired configuration.
pub struct DeviceTarget {
    pub device: Box<dyn DeviceProtocol>,
    pub desired: Result<ConfigSnapshot, ValidationError>,
    /// Per-device retry policy; the run's policy when `None`.
    pub retry: Option<RetryPolicy>,
    /// Per-device rollback setting; the run's setting when `None`.
    pub rollback: Option<bool>,
}

impl DeviceTarget {
    pub fn new(device: Box<dyn DeviceProtocol>, desired: Result<ConfigSnapshot, ValidationError>) -> Self {
        Self {
            device,
            desired,
            retry: None,
            rollback: None,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_rollback(mut self, rollback: bool) -> Self {
        self.rollback = Some(rollback);
        self
    }
}

/// Settings in effect for one device's run.
struct DeviceSettings {
    retry: RetryPolicy,
    rollback: bool,
}

// ── Reconciler ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Reconciler {
    options: Arc<ReconcileOptions>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(options: ReconcileOptions) -> Self {
        Self {
            options: Arc::new(options),
            sink: Arc::new(TracingSink),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Use an externally owned token (e.g. wired to Ctrl-C).
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetch live state and compute the ordered change set, without
    /// writing anything.
    pub async fn plan_device(
        &self,
        device: &mut dyn DeviceProtocol,
        desired: &ConfigSnapshot,
    ) -> Result<Plan, ReconcileError> {
        self.plan_with(device, desired, &self.options.retry, &self.cancel).await
    }

    /// Reconcile one device to `desired`.
    pub async fn reconcile_device(
        &self,
        device: Box<dyn DeviceProtocol>,
        desired: Result<ConfigSnapshot, ValidationError>,
    ) -> DeviceReport {
        self.run_device(device, desired, self.default_settings(), self.cancel.clone())
            .await
    }

    /// Reconcile every target concurrently, one task per device.
    pub async fn reconcile_all(&self, targets: Vec<DeviceTarget>) -> ReconcileReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let run_cancel = self.cancel.child_token();
        info!(%run_id, devices = targets.len(), "reconciliation started");

        let deadline = self.options.deadline.map(|limit| {
            let cancel = run_cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = tokio::time::sleep(limit) => {
                        warn!(deadline_secs = limit.as_secs(), "deadline reached, cancelling");
                        cancel.cancel();
                    }
                    () = cancel.cancelled() => {}
                }
            })
        });

        let mut names = Vec::with_capacity(targets.len());
        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let DeviceTarget {
                device,
                desired,
                retry,
                rollback,
            } = target;
            names.push(device.name().to_owned());
            let defaults = self.default_settings();
            let settings = DeviceSettings {
                retry: retry.unwrap_or(defaults.retry),
                rollback: rollback.unwrap_or(defaults.rollback),
            };
            let this = self.clone();
            let cancel = run_cancel.clone();
            handles.push(tokio::spawn(async move {
                this.run_device(device, desired, settings, cancel).await
            }));
        }

        let devices = futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, name)| {
                joined.unwrap_or_else(|e| {
                    warn!(device = %name, error = %e, "device task failed");
                    DeviceReport::aborted(name, &ReconcileError::Internal(e.to_string()))
                })
            })
            .collect();

        if let Some(timer) = deadline {
            timer.abort();
        }

        let report = ReconcileReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            devices,
        };
        info!(%run_id, status = ?report.status(), "reconciliation finished");
        report
    }

    fn default_settings(&self) -> DeviceSettings {
        DeviceSettings {
            retry: self.options.retry.clone(),
            rollback: self.options.rollback,
        }
    }

    async fn plan_with(
        &self,
        device: &mut dyn DeviceProtocol,
        desired: &ConfigSnapshot,
        retry: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<Plan, ReconcileError> {
        let name = device.name().to_owned();
        let kinds = &self.options.kinds;

        // Fetch everything: deletes must be checked against dependents of
        // every kind, managed or not.
        let live = fetch_live(
            device,
            &EntityKind::all(),
            retry,
            self.sink.as_ref(),
            cancel,
        )
        .await?;

        let operations = diff(&desired.restricted_to(kinds), &live.restricted_to(kinds));
        let change_set = order(&name, operations, &live)?;
        debug!(device = %name, operations = change_set.len(), "planned");
        self.sink.emit(&ReconcileEvent::Planned {
            device: name,
            operations: change_set.len(),
        });
        Ok(Plan { live, change_set })
    }

    async fn run_device(
        &self,
        mut device: Box<dyn DeviceProtocol>,
        desired: Result<ConfigSnapshot, ValidationError>,
        settings: DeviceSettings,
        cancel: CancellationToken,
    ) -> DeviceReport {
        let name = device.name().to_owned();

        let desired = match desired {
            Ok(desired) => desired,
            Err(e) => return DeviceReport::aborted(name, &e.into()),
        };
        let plan = match self
            .plan_with(device.as_mut(), &desired, &settings.retry, &cancel)
            .await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(device = %name, stage = %e.stage(), error = %e, "reconciliation aborted");
                return DeviceReport::aborted(name, &e);
            }
        };
        if plan.change_set.is_empty() {
            info!(device = %name, "already converged");
            return DeviceReport {
                device: name,
                outcome: DeviceOutcome::Success,
                transactional: device.supports_transactions(),
                operations: Vec::new(),
            };
        }

        if cancel.is_cancelled() {
            info!(device = %name, "cancelled before apply");
            return DeviceReport::aborted(name, &ReconcileError::Cancelled);
        }

        let applied = ApplyCoordinator::new(
            device.as_mut(),
            &settings.retry,
            self.sink.as_ref(),
            &cancel,
        )
        .rollback(settings.rollback)
        .apply(&plan.change_set, &plan.live)
        .await;

        let outcome = if let Some(reason) = applied.not_started {
            warn!(device = %name, %reason, "reconciliation aborted");
            DeviceOutcome::Aborted {
                stage: Stage::Apply,
                reason,
            }
        } else if applied.cancelled {
            DeviceOutcome::Cancelled
        } else if applied.all_applied() {
            DeviceOutcome::Success
        } else {
            DeviceOutcome::PartialFailure
        };
        DeviceReport {
            device: name,
            outcome,
            transactional: applied.transactional,
            operations: applied.operations,
        }
    }
}
