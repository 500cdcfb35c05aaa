//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Verificador: force a UI into a locale, reach a feature and classify
/// the text it shows
#[derive(Parser, Debug)]
#[command(name = "verificador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (failures only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, default_value = "pretty", global = true, env = "VERIFICADOR_LOG_FORMAT")]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run locale verifications and write reports
    Run(RunArgs),

    /// Check run configurations without opening a browser
    Validate(ValidateArgs),

    /// Write an example run configuration
    Init(InitArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Run configuration files (YAML or JSON); several run concurrently
    #[arg(short, long = "config", required = true, num_args = 1..)]
    pub configs: Vec<PathBuf>,

    /// Override the artifact directory of every config
    #[arg(short, long)]
    pub artifact_dir: Option<PathBuf>,

    /// Report format on stdout
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,

    /// Run against a scripted page instead of a browser
    #[arg(long)]
    pub dry_run: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Chromium executable
    #[arg(long, env = "VERIFICADOR_CHROMIUM")]
    pub chromium: Option<PathBuf>,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Run configuration files (YAML or JSON)
    #[arg(required = true)]
    pub configs: Vec<PathBuf>,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output file
    #[arg(default_value = "verificar.yaml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

/// Report format on stdout
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable step list
    #[default]
    Text,
    /// Full reports as a JSON array
    Json,
}

/// Color choice argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl From<LogFormatArg> for crate::config::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Exit status for a command line clap rejected.
///
/// Help and version requests exit 0; every usage error exits 1.
#[must_use]
pub fn usage_exit_code(err: &clap::Error) -> u8 {
    u8::from(err.use_stderr())
}
