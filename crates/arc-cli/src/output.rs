//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use arc_core::{ApplyResult, ConfigEntity, DeviceOutcome, DeviceReport, Operation, OperationReport};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn paint_result(result: &ApplyResult, color: bool) -> String {
    let text = result.to_string();
    if !color {
        return text;
    }
    match result {
        ApplyResult::Applied => text.green().to_string(),
        ApplyResult::Failed(_) => text.red().to_string(),
        ApplyResult::Skipped(_) => text.dimmed().to_string(),
        ApplyResult::RolledBack => text.yellow().to_string(),
    }
}

fn paint_outcome(outcome: &DeviceOutcome, color: bool) -> String {
    let text = match outcome {
        DeviceOutcome::Success => "success".to_owned(),
        DeviceOutcome::PartialFailure => "partial failure".to_owned(),
        DeviceOutcome::Aborted { stage, reason } => format!("aborted at {stage}: {reason}"),
        DeviceOutcome::Cancelled => "cancelled".to_owned(),
    };
    if !color {
        return text;
    }
    match outcome {
        DeviceOutcome::Success => text.green().to_string(),
        DeviceOutcome::PartialFailure | DeviceOutcome::Cancelled => text.yellow().to_string(),
        DeviceOutcome::Aborted { .. } => text.red().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("serialization failed: {e}"))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("serialization failed: {e}"))
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct PlanRow {
    #[tabled(rename = "#")]
    pub step: usize,
    #[tabled(rename = "Operation")]
    pub verb: &'static str,
    #[tabled(rename = "Entity")]
    pub key: String,
    #[tabled(rename = "Details")]
    pub details: String,
}

impl PlanRow {
    pub fn new(step: usize, op: &Operation) -> Self {
        let details = match op {
            Operation::Create { entity } => summarize_properties(entity),
            Operation::Update { changes, .. } => changes
                .iter()
                .map(|(name, value)| format!("{name} = {value}"))
                .collect::<Vec<_>>()
                .join(", "),
            Operation::Delete { .. } => String::new(),
        };
        Self {
            step,
            verb: op.verb(),
            key: op.key().to_string(),
            details,
        }
    }
}

#[derive(Tabled)]
pub struct OperationRow {
    #[tabled(rename = "Device")]
    pub device: String,
    #[tabled(rename = "Operation")]
    pub operation: String,
    #[tabled(rename = "Result")]
    pub result: String,
    #[tabled(rename = "Attempts")]
    pub attempts: u32,
}

impl OperationRow {
    pub fn new(device: &str, report: &OperationReport, color: bool) -> Self {
        Self {
            device: device.to_owned(),
            operation: report.operation.to_string(),
            result: paint_result(&report.result, color),
            attempts: report.attempts,
        }
    }
}

#[derive(Tabled)]
pub struct DeviceRow {
    #[tabled(rename = "Device")]
    pub device: String,
    #[tabled(rename = "Outcome")]
    pub outcome: String,
    #[tabled(rename = "Applied")]
    pub applied: usize,
    #[tabled(rename = "Failed")]
    pub failed: usize,
    #[tabled(rename = "Skipped")]
    pub skipped: usize,
    #[tabled(rename = "Rolled back")]
    pub rolled_back: usize,
}

impl DeviceRow {
    pub fn new(report: &DeviceReport, color: bool) -> Self {
        Self {
            device: report.device.clone(),
            outcome: paint_outcome(&report.outcome, color),
            applied: report.count("applied"),
            failed: report.count("failed"),
            skipped: report.count("skipped"),
            rolled_back: report.count("rolled back"),
        }
    }
}

#[derive(Tabled)]
pub struct EntityRow {
    #[tabled(rename = "Entity")]
    pub key: String,
    #[tabled(rename = "Properties")]
    pub properties: String,
    #[tabled(rename = "Depends on")]
    pub depends_on: String,
}

impl From<&ConfigEntity> for EntityRow {
    fn from(entity: &ConfigEntity) -> Self {
        Self {
            key: entity.key().to_string(),
            properties: summarize_properties(entity),
            depends_on: entity
                .depends_on
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Tabled)]
pub struct PoeRow {
    #[tabled(rename = "Port")]
    pub port: String,
    #[tabled(rename = "PoE")]
    pub enabled: &'static str,
    #[tabled(rename = "Priority")]
    pub priority: String,
    #[tabled(rename = "Allocation")]
    pub allocation: String,
    #[tabled(rename = "Power (W)")]
    pub power: u32,
}

impl From<&arc_api::PortPoe> for PoeRow {
    fn from(p: &arc_api::PortPoe) -> Self {
        Self {
            port: p.port_id.clone(),
            enabled: if p.is_poe_enabled { "on" } else { "off" },
            priority: p.poe_priority.clone(),
            allocation: p.poe_allocation_method.clone(),
            power: p.allocated_power_in_watts,
        }
    }
}

fn summarize_properties(entity: &ConfigEntity) -> String {
    entity
        .properties
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}
