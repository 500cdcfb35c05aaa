//! Verificador CLI: locale verification from the command line
//!
//! ## Usage
//!
//! ```bash
//! verificador init                          # Write verificar.yaml
//! verificador validate verificar.yaml       # Check configs offline
//! verificador run -c verificar.yaml         # Verify in chromium
//! verificador run -c es.yaml pt.yaml -f json
//! ```
//!
//! Exit status is 0 when every run passed and 1 otherwise, including usage
//! errors.

use clap::Parser;
use std::process::ExitCode;
use verificador::{
    logging, usage_exit_code, validate_files, write_example, Cli, CliConfig, CliError, CliResult,
    Commands, InitArgs, ProgressReporter, RunArgs, ValidateArgs, Verbosity, VerificationRunner,
};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout, usage errors to stderr
            let _ = e.print();
            return ExitCode::from(usage_exit_code(&e));
        }
    };
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = build_config(&cli);
    logging::init(&config)?;

    match cli.command {
        Commands::Run(args) => run_verify(config, &args),
        Commands::Validate(args) => run_validate(&config, &args),
        Commands::Init(args) => run_init(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.clone().into())
        .with_log_format(cli.log_format.into())
}

fn reporter(config: &CliConfig) -> ProgressReporter {
    ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
}

fn run_verify(config: CliConfig, args: &RunArgs) -> CliResult<()> {
    let mut runner = VerificationRunner::new(config);
    let reports = runner.run(args)?;

    let failed = reports.iter().filter(|r| !r.passed()).count();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::verification_failed(format!(
            "{failed} of {} run(s) failed",
            reports.len()
        )))
    }
}

fn run_validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    validate_files(&args.configs, &reporter(config))
}

fn run_init(config: &CliConfig, args: &InitArgs) -> CliResult<()> {
    write_example(&args.path, args.force)?;
    reporter(config).success(&format!("wrote {}", args.path.display()));
    Ok(())
}
