//! Clap derive structures for the `arc` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// arc -- declarative configuration for Aruba switches
#[derive(Debug, Parser)]
#[command(
    name = "arc",
    version,
    about = "Reconcile Aruba switches against a declared configuration",
    long_about = "Declare VLANs, interfaces, ACLs and static routes per switch,\n\
        then plan and apply the minimal, dependency-ordered set of changes\n\
        through the switch REST API (rest/v1).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Switch profile to use
    #[arg(long, short = 'p', env = "ARC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "ARC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ARC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "ARC_INSECURE", global = true)]
    pub insecure: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in to a switch and cache the session cookie
    Login(LoginArgs),

    /// Show the ordered changes that would converge each switch
    Plan(PlanArgs),

    /// Converge switches to the declared configuration
    Apply(ApplyArgs),

    /// Show the normalized live configuration of a switch
    Show(ShowArgs),

    /// Read and write Power-over-Ethernet port settings
    Port(PortArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Login ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Profile to log in with (defaults to --profile / default_profile)
    pub profile: Option<String>,

    /// Switch address; saved as a new profile when it doesn't exist yet
    #[arg(long)]
    pub host: Option<String>,

    /// Management user for --host
    #[arg(long, short = 'u', default_value = "manager")]
    pub username: String,
}

// ── Reconciliation ───────────────────────────────────────────────────

/// Desired-configuration selection shared by `plan` and `apply`.
#[derive(Debug, Args)]
pub struct DesiredArgs {
    /// Desired configuration (YAML or TOML); defaults to `desired_config`
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Limit the run to these devices (repeatable)
    #[arg(long = "device", short = 'd')]
    pub devices: Vec<String>,

    /// Manage only these entity kinds (repeatable)
    #[arg(long = "kind")]
    pub kinds: Vec<KindArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Vlan,
    Interface,
    Acl,
    AclRule,
    StaticRoute,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub desired: DesiredArgs,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub desired: DesiredArgs,

    /// Keep applied operations after a failure instead of compensating
    #[arg(long)]
    pub no_rollback: bool,

    /// Cancel the run after this long (e.g. "90s", "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub deadline: Option<Duration>,

    /// Apply to an in-memory copy of the live state; the switch is only read
    #[arg(long)]
    pub simulate: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Device (profile) name; defaults to --profile / default_profile
    pub device: Option<String>,

    /// Show only these entity kinds (repeatable)
    #[arg(long = "kind")]
    pub kinds: Vec<KindArg>,
}

// ── Ports ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PortArgs {
    #[command(subcommand)]
    pub command: PortCommand,
}

#[derive(Debug, Subcommand)]
pub enum PortCommand {
    /// Show PoE state of ports ("all" for every port)
    Get {
        #[arg(required = true)]
        ports: Vec<String>,
    },

    /// Write a JSON body to the PoE settings of each port, concurrently
    Set {
        #[arg(required = true)]
        ports: Vec<String>,

        /// JSON body, e.g. '{"is_poe_enabled": false}'
        data: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Show the current configuration
    Show,

    /// Print the config file path
    Path,

    /// List profiles
    Profiles,

    /// Store a profile's password in the system keyring
    SetPassword {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
