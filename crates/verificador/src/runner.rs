//! Verification runner: loads run configs, drives the engine, writes reports

use crate::commands::{ReportFormat, RunArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{render_json, ProgressReporter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use verificar::{run, validate_all, MockDriver, MockPage, RunConfig, VerificationReport};

/// Load and validate every config file
pub fn load_configs(paths: &[PathBuf]) -> CliResult<Vec<RunConfig>> {
    if paths.is_empty() {
        return Err(CliError::invalid_argument("no run configuration given"));
    }
    let configs = paths
        .iter()
        .map(|p| {
            RunConfig::from_path(p).map_err(|e| CliError::config(format!("{}: {e}", p.display())))
        })
        .collect::<CliResult<Vec<_>>>()?;
    validate_all(&configs)?;
    Ok(configs)
}

/// Artifact directory a run writes to.
///
/// A single run writes straight into its directory; concurrent runs each
/// get a `{locale}-{target}` subdirectory.
#[must_use]
pub fn run_artifact_dir(config: &RunConfig, concurrent: bool) -> PathBuf {
    if concurrent {
        config.scoped_artifact_dir()
    } else {
        config.artifact_dir.clone()
    }
}

/// Runs verifications for the `run` command
#[derive(Debug)]
pub struct VerificationRunner {
    config: CliConfig,
    reporter: ProgressReporter,
}

impl VerificationRunner {
    /// Create a new runner
    #[must_use]
    pub fn new(config: CliConfig) -> Self {
        let reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        Self { config, reporter }
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Apply command-line overrides on top of the file settings
    #[must_use]
    pub fn apply_overrides(args: &RunArgs, mut config: RunConfig) -> RunConfig {
        if let Some(ref dir) = args.artifact_dir {
            config.artifact_dir.clone_from(dir);
        }
        if args.headed {
            config.driver.headless = false;
        }
        if let Some(ref chromium) = args.chromium {
            config.driver.chromium_path = Some(chromium.to_string_lossy().into_owned());
        }
        config
    }

    /// Run every configured verification and write their reports.
    ///
    /// Returns the reports in input order; whether they passed is up to
    /// the caller.
    pub fn run(&mut self, args: &RunArgs) -> CliResult<Vec<VerificationReport>> {
        let configs: Vec<RunConfig> = load_configs(&args.configs)?
            .into_iter()
            .map(|c| Self::apply_overrides(args, c))
            .collect();
        let concurrent = configs.len() > 1;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        let start = Instant::now();
        let label: Vec<&str> = configs.iter().map(|c| c.target_locale.code.as_str()).collect();
        self.reporter.start_spinner(&format!("verifying {}", label.join(", ")));
        let reports = runtime.block_on(execute(&configs, args.dry_run));
        self.reporter.finish();
        let reports = reports?;

        for (config, report) in configs.iter().zip(&reports) {
            let dir = run_artifact_dir(config, concurrent);
            let written = report.write_to(&dir)?;
            tracing::info!(dir = %dir.display(), files = written.len(), "report written");
        }

        match args.format {
            ReportFormat::Json => {
                let json = render_json(&reports).map_err(verificar::VerificarError::from)?;
                println!("{json}");
            }
            ReportFormat::Text => {
                for report in &reports {
                    self.reporter.report(report, self.config.verbosity.is_verbose());
                }
                if concurrent {
                    self.reporter.totals(&reports, start.elapsed());
                }
            }
        }
        Ok(reports)
    }
}

async fn execute(configs: &[RunConfig], dry_run: bool) -> CliResult<Vec<VerificationReport>> {
    if dry_run {
        return Ok(execute_scripted(configs).await);
    }
    execute_live(configs).await
}

/// Each config runs against its own scripted page on which it passes.
async fn execute_scripted(configs: &[RunConfig]) -> Vec<VerificationReport> {
    let concurrent = configs.len() > 1;
    let runs = configs.iter().map(|config| async move {
        let driver = MockDriver::new(MockPage::happy_path(config));
        let scoped = config.clone().with_artifact_dir(run_artifact_dir(config, concurrent));
        run(&driver, &scoped).await
    });
    futures::future::join_all(runs).await
}

#[cfg(feature = "browser")]
async fn execute_live(configs: &[RunConfig]) -> CliResult<Vec<VerificationReport>> {
    let driver = verificar::ChromiumDriver;
    Ok(match configs {
        [single] => vec![run(&driver, single).await],
        _ => verificar::verify_all(&driver, configs).await,
    })
}

#[cfg(not(feature = "browser"))]
async fn execute_live(_configs: &[RunConfig]) -> CliResult<Vec<VerificationReport>> {
    Err(CliError::invalid_argument(
        "built without the `browser` feature; rebuild with --features browser or pass --dry-run",
    ))
}

/// Check config files and report each one
pub fn validate_files(paths: &[PathBuf], reporter: &ProgressReporter) -> CliResult<()> {
    let configs = load_configs(paths)?;
    for (path, config) in paths.iter().zip(&configs) {
        reporter.success(&format!(
            "{}: {}/{} ({} navigation strateg(ies))",
            path.display(),
            config.target_locale.code,
            config.navigation_target.name,
            config.navigation_target.strategies.len()
        ));
    }
    Ok(())
}

/// Write the example configuration to `path`
pub fn write_example(path: &Path, force: bool) -> CliResult<()> {
    if path.exists() && !force {
        return Err(CliError::invalid_argument(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = verificar::presets::meal_scanner_es().to_yaml()?;
    std::fs::write(path, yaml)?;
    Ok(())
}
