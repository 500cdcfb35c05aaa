//! Verificador CLI Library
//!
//! Command-line interface for the Verificar locale verification engine.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)] // Step lines are built incrementally
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
mod runner;

pub use commands::{
    usage_exit_code, Cli, ColorArg, Commands, InitArgs, LogFormatArg, ReportFormat, RunArgs,
    ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_json, render_step, render_totals, ProgressReporter};
pub use runner::{
    load_configs, run_artifact_dir, validate_files, write_example, VerificationRunner,
};
