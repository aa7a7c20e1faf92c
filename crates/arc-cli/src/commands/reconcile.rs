//! `plan` and `apply`: drive the engine over every selected device.

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use arc_config::Config;
use arc_core::{
    ConfigSnapshot, DeviceProtocol, DeviceReport, DeviceTarget, EntityKind, MemoryDevice,
    Operation, ReconcileError, ReconcileOptions, ReconcileReport, Reconciler, RetryPolicy, Stage,
    TracingSink, ValidationError, fetch_live,
};

use crate::cli::{ApplyArgs, DesiredArgs, GlobalOpts, OutputFormat, PlanArgs};
use crate::desired;
use crate::error::CliError;
use crate::output::{self, DeviceRow, OperationRow, PlanRow};

use super::util;

type Declared = Vec<(String, Result<ConfigSnapshot, ValidationError>)>;

fn load_declared(args: &DesiredArgs, cfg: &Config, global: &GlobalOpts) -> Result<(Declared, String), CliError> {
    let path = desired::resolve_path(args.file.as_deref(), cfg, &util::config_path(global))?;
    let raw = desired::load(&path)?;
    Ok((desired::select(&raw, &args.devices)?, path.display().to_string()))
}

fn retry_for(cfg: &Config, device: &str) -> RetryPolicy {
    cfg.profiles.get(device).map_or_else(
        || RetryPolicy::default().with_budget(cfg.defaults.retry_budget),
        |p| p.retry_policy(&cfg.defaults),
    )
}

fn run_options(cfg: &Config, kinds: Vec<EntityKind>) -> ReconcileOptions {
    ReconcileOptions {
        retry: RetryPolicy::default().with_budget(cfg.defaults.retry_budget),
        rollback: cfg.defaults.rollback,
        kinds,
        deadline: None,
    }
}

/// Exit status for a multi-device command where `failed` of `total`
/// devices did not reach their goal.
fn finish(failed: usize, total: usize) -> Result<(), CliError> {
    match failed {
        0 => Ok(()),
        n if n == total => Err(CliError::TotalFailure),
        n => Err(CliError::PartialFailure { failed: n, total }),
    }
}

// ── Plan ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PlanFailure {
    stage: Stage,
    reason: String,
}

#[derive(Debug, Serialize)]
struct DevicePlan {
    device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<PlanFailure>,
    operations: Vec<Operation>,
}

impl DevicePlan {
    fn headline(&self) -> String {
        match (&self.error, self.operations.len()) {
            (Some(e), _) => format!("{}: failed at {}: {}", self.device, e.stage, e.reason),
            (None, 0) => format!("{}: up to date", self.device),
            (None, 1) => format!("{}: 1 change", self.device),
            (None, n) => format!("{}: {n} changes", self.device),
        }
    }
}

async fn plan_device(
    cfg: &Config,
    global: &GlobalOpts,
    kinds: Vec<EntityKind>,
    name: &str,
    desired: Result<ConfigSnapshot, ValidationError>,
) -> Result<Vec<Operation>, ReconcileError> {
    let desired = desired?;
    let mut switch = util::open_device(cfg, name, global).await?;
    let options = ReconcileOptions {
        retry: retry_for(cfg, name),
        ..run_options(cfg, kinds)
    };
    let plan = Reconciler::new(options).plan_device(&mut switch, &desired).await?;
    Ok(plan.change_set.operations)
}

pub async fn plan(args: PlanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let (declared, _) = load_declared(&args.desired, &cfg, global)?;
    let kinds = util::kinds(&args.desired.kinds);

    let plans: Vec<DevicePlan> = join_all(declared.into_iter().map(|(name, desired)| {
        let (cfg, kinds) = (&cfg, kinds.clone());
        async move {
            match plan_device(cfg, global, kinds, &name, desired).await {
                Ok(operations) => DevicePlan {
                    device: name,
                    error: None,
                    operations,
                },
                Err(e) => DevicePlan {
                    device: name,
                    error: Some(PlanFailure {
                        stage: e.stage(),
                        reason: e.to_string(),
                    }),
                    operations: Vec::new(),
                },
            }
        }
    }))
    .await;

    let out = match global.output {
        OutputFormat::Table => plans
            .iter()
            .map(|p| {
                if p.operations.is_empty() {
                    p.headline()
                } else {
                    let rows: Vec<PlanRow> = p
                        .operations
                        .iter()
                        .enumerate()
                        .map(|(i, op)| PlanRow::new(i + 1, op))
                        .collect();
                    format!("{}\n{}", p.headline(), output::render_table(&rows))
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        OutputFormat::Plain => plans
            .iter()
            .flat_map(|p| p.operations.iter().map(move |op| format!("{}\t{op}", p.device)))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => output::render_single(&global.output, &plans, |_| String::new(), |_| String::new()),
    };
    output::print_output(&out, global.quiet);

    let failed = plans.iter().filter(|p| p.error.is_some()).count();
    finish(failed, plans.len())
}

// ── Apply ────────────────────────────────────────────────────────────

/// Connect a device; under `--simulate`, swap it for an in-memory copy of
/// its live configuration.
async fn open_target(
    cfg: &Config,
    global: &GlobalOpts,
    name: &str,
    simulate: bool,
) -> Result<Box<dyn DeviceProtocol>, ReconcileError> {
    let mut switch = util::open_device(cfg, name, global).await?;
    if !simulate {
        return Ok(Box::new(switch));
    }

    let live = fetch_live(
        &mut switch,
        &EntityKind::all(),
        &retry_for(cfg, name),
        &TracingSink,
        &CancellationToken::new(),
    )
    .await?;
    info!(device = %name, entities = live.len(), "simulating against a copy of the live configuration");
    Ok(Box::new(MemoryDevice::from_snapshot(name, &live)))
}

fn render_report(report: &ReconcileReport, global: &GlobalOpts) -> String {
    let color = output::should_color(&global.color);
    match global.output {
        OutputFormat::Table => {
            let devices: Vec<DeviceRow> = report.devices.iter().map(|d| DeviceRow::new(d, color)).collect();
            let operations: Vec<OperationRow> = report
                .devices
                .iter()
                .flat_map(|d| d.operations.iter().map(move |op| OperationRow::new(&d.device, op, color)))
                .collect();
            if operations.is_empty() {
                output::render_table(&devices)
            } else {
                format!(
                    "{}\n{}",
                    output::render_table(&devices),
                    output::render_table(&operations)
                )
            }
        }
        OutputFormat::Plain => report
            .devices
            .iter()
            .flat_map(|d| {
                d.operations
                    .iter()
                    .map(move |r| format!("{}\t{}\t{}", d.device, r.operation, r.result))
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => output::render_single(&global.output, report, |_| String::new(), |_| String::new()),
    }
}

pub async fn apply(args: ApplyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let (declared, path) = load_declared(&args.desired, &cfg, global)?;

    if !args.simulate
        && !util::confirm(
            &format!("Apply {path} to {} device(s)?", declared.len()),
            global.yes,
        )?
    {
        return Ok(());
    }

    let mut options = run_options(&cfg, util::kinds(&args.desired.kinds));
    options.deadline = args.deadline;
    let cancel = CancellationToken::new();
    let reconciler = Reconciler::new(options).with_cancellation(cancel.clone());

    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping after in-flight operations");
                cancel.cancel();
            }
        })
    };

    let simulate = args.simulate;
    let names: Vec<String> = declared.iter().map(|(name, _)| name.clone()).collect();
    let opened = join_all(declared.into_iter().map(|(name, desired)| {
        let cfg = &cfg;
        async move {
            let device = match &desired {
                // Don't touch a switch whose declaration is invalid.
                Err(e) => Err(ReconcileError::Validation(e.clone())),
                Ok(_) => open_target(cfg, global, &name, simulate).await,
            };
            (name, desired, device)
        }
    }))
    .await;

    let mut early = Vec::new();
    let mut targets = Vec::new();
    for (name, desired, device) in opened {
        match device {
            Ok(device) => {
                let rollback = cfg
                    .profiles
                    .get(&name)
                    .map_or(cfg.defaults.rollback, |p| p.rollback(&cfg.defaults));
                targets.push(
                    DeviceTarget::new(device, desired)
                        .with_retry(retry_for(&cfg, &name))
                        .with_rollback(rollback && !args.no_rollback),
                );
            }
            Err(e) => {
                warn!(device = %name, stage = %e.stage(), error = %e, "device not reconciled");
                early.push(DeviceReport::aborted(name, &e));
            }
        }
    }

    let mut report = reconciler.reconcile_all(targets).await;
    interrupt.abort();
    report.devices.extend(early);
    report
        .devices
        .sort_by_key(|d| names.iter().position(|n| *n == d.device));

    output::print_output(&render_report(&report, global), global.quiet);
    if simulate && !global.quiet {
        eprintln!("Simulation only: no changes were written to any switch.");
    }

    let failed = report.devices.iter().filter(|d| !d.is_success()).count();
    CliError::from_status(report.status(), failed, report.devices.len()).map_or(Ok(()), Err)
}
