//! Output formatting and progress reporting

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use verificar::{StepOutcome, StepResult, VerificationReport};

/// Progress reporter for verification runs
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Start a spinner while runs are in flight
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {elapsed} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    /// Clear the spinner
    pub fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefix("✓", "PASS", Color::Green), message);
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode
        self.line(&self.prefix("✗", "FAIL", Color::Red), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefix("⚠", "WARN", Color::Yellow), message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefix("ℹ", "INFO", Color::Blue), message);
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print one report: a header, one line per step and the summary
    pub fn report(&self, report: &VerificationReport, verbose: bool) {
        self.header(&format!("{}/{}", report.locale(), report.target()));
        for step in report.steps() {
            let line = render_step(step, verbose);
            match step.outcome {
                StepOutcome::Success => self.success(&line),
                StepOutcome::Inconclusive => self.warning(&line),
                StepOutcome::Failure => self.failure(&line),
            }
        }
        if report.passed() {
            self.success(&report.summary());
        } else {
            self.failure(&report.summary());
        }
    }

    /// Print the totals over several runs
    pub fn totals(&self, reports: &[VerificationReport], duration: Duration) {
        let failed = reports.iter().filter(|r| !r.passed()).count();
        if self.quiet && failed == 0 {
            return;
        }
        let line = render_totals(reports.len(), failed, duration);
        let _ = self.term.write_line("");
        let styled = match (self.use_color, failed) {
            (false, _) => line,
            (true, 0) => style(line).green().bold().to_string(),
            (true, _) => style(line).red().bold().to_string(),
        };
        let _ = self.term.write_line(&styled);
    }

    fn prefix(&self, symbol: &str, plain: &str, color: Color) -> String {
        if !self.use_color {
            return plain.to_string();
        }
        let styled = style(symbol).bold();
        match color {
            Color::Green => styled.green(),
            Color::Red => styled.red(),
            Color::Yellow => styled.yellow(),
            Color::Blue => styled.blue(),
        }
        .to_string()
    }

    fn line(&self, prefix: &str, message: &str) {
        let text = format!("{prefix} {message}");
        match self.spinner {
            Some(ref spinner) => spinner.suspend(|| {
                let _ = self.term.write_line(&text);
            }),
            None => {
                let _ = self.term.write_line(&text);
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Color {
    Green,
    Red,
    Yellow,
    Blue,
}

/// Render one step line
#[must_use]
pub fn render_step(step: &StepResult, verbose: bool) -> String {
    let mut line = format!("{}. {} [{}ms]", step.index, step, step.elapsed_ms);
    if let Some(ref error) = step.error {
        line.push_str(&format!("\n     {}", error.message));
    }
    if verbose {
        for attempt in &step.trail {
            line.push_str(&format!("\n     tried {attempt}"));
        }
        for path in &step.artifact_paths {
            line.push_str(&format!("\n     artifact {}", path.display()));
        }
    }
    for note in &step.notes {
        line.push_str(&format!("\n     note: {note}"));
    }
    line
}

/// Render the closing totals line
#[must_use]
pub fn render_totals(total: usize, failed: usize, duration: Duration) -> String {
    let status = if failed > 0 { "FAILED" } else { "PASSED" };
    format!(
        "{status} {total} run(s) in {:.2}s ({} passed, {failed} failed)",
        duration.as_secs_f64(),
        total - failed
    )
}

/// Render reports as a JSON array
///
/// # Errors
///
/// Returns error if serialization fails
pub fn render_json(reports: &[VerificationReport]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}
