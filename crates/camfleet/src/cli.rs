//! Clap derive structures for the `camfleet` CLI.
//!
//! Defines the command tree, global flags, and shared argument groups.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// camfleet -- reconcile and validate camera encoder settings
#[derive(Debug, Parser)]
#[command(
    name = "camfleet",
    version,
    about = "Reconcile and validate encoder settings across a camera fleet",
    long_about = "Pushes a desired video encoder configuration to many ONVIF cameras at once,\n\
        adapting it to what each camera supports, then probes every stream to\n\
        confirm the camera actually delivers it.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "CAMFLEET_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Camera inventory CSV (overrides config)
    #[arg(long, short = 'i', env = "CAMFLEET_INVENTORY", global = true)]
    pub inventory: Option<PathBuf>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "CAMFLEET_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Per-request device timeout in seconds
    #[arg(long, env = "CAMFLEET_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Inspect the camera inventory
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Apply an encoder configuration, then validate every stream
    Apply(ApplyArgs),

    /// Validate current streams against a configuration without writing
    #[command(alias = "check")]
    Validate(ValidateArgs),

    /// Manage CLI configuration and camera passwords
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

/// Which cameras a batch targets.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// Camera ids, comma-separated (e.g. 1,2,3)
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Every camera in the inventory
    #[arg(long)]
    pub all: bool,
}

/// The requested encoder configuration. Falls back to `[desired]` in the
/// config file when no size is given.
#[derive(Debug, Args)]
pub struct DesiredArgs {
    /// Target width in pixels
    #[arg(long, requires = "height")]
    pub width: Option<u32>,

    /// Target height in pixels
    #[arg(long, requires = "width")]
    pub height: Option<u32>,

    /// Target frame rate (fps)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Target bitrate in kbps
    #[arg(long)]
    pub bitrate: Option<u32>,

    /// Target encoding (H264, H265, JPEG)
    #[arg(long)]
    pub encoding: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List cameras from the inventory
    #[command(alias = "ls")]
    List,

    /// Check one camera: reachability, current encoder settings, options
    Check {
        /// Camera id from the inventory
        id: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  APPLY / VALIDATE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    #[command(flatten)]
    pub desired: DesiredArgs,

    /// Cameras processed in parallel
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    /// Wait between applying and validating, in milliseconds
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Only accept resolutions with nearly the same aspect ratio
    #[arg(long)]
    pub strict_ratio: bool,

    /// Never retry through the fallback (Media2) protocol
    #[arg(long)]
    pub no_fallback: bool,

    /// Write per-camera results to a CSV file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    #[command(flatten)]
    pub desired: DesiredArgs,

    /// Cameras validated in parallel
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    /// Write per-camera results to a CSV file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Store a camera password in the system keyring
    SetPassword {
        /// Camera id from the inventory
        id: String,
    },

    /// Save the desired encoder configuration from a CSV file
    ///
    /// Header row plus one data row. Required columns: width, height, fps.
    /// Optional: bitrate, encoding.
    Import {
        /// CSV file to read
        path: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
