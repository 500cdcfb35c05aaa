//! Step results and the verification report.
//!
//! A [`VerificationReport`] is built once per run by the orchestrator and
//! is immutable afterwards. It serializes as one JSON document, as JSON
//! lines (one record per step) and as JUnit XML for CI.

use crate::asserter::{Classification, ClassificationResult, FallbackPolicy};
use crate::locale::LocaleOutcome;
use crate::result::{VerificarError, VerificarResult};
use crate::strategy::{StrategyAttempt, StrategyUsed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Whole-report JSON file name
pub const REPORT_JSON: &str = "report.json";
/// Per-step JSON lines file name
pub const REPORT_JSONL: &str = "report.jsonl";
/// JUnit XML file name
pub const REPORT_JUNIT: &str = "junit.xml";

/// Outcome of one step, or of the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Step did what it had to
    Success,
    /// Step failed
    Failure,
    /// Step ran but its result cannot be judged
    Inconclusive,
}

impl StepOutcome {
    /// Check if outcome is success
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Inconclusive => "inconclusive",
        };
        f.write_str(s)
    }
}

/// Error as recorded in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    /// Machine-readable kind, e.g. `locale_switch_failed`
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl From<&VerificarError> for ReportedError {
    fn from(err: &VerificarError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Typed per-step detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StepDetail {
    /// Result of locale reconciliation
    Locale(LocaleOutcome),
    /// Result of a text classification
    Classification(ClassificationResult),
}

/// What a step body hands back to the diagnostics wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    /// Step outcome
    pub outcome: StepOutcome,
    /// Winning strategy, if the step resolved one
    pub strategy_used: Option<StrategyUsed>,
    /// Failed strategy attempts
    pub trail: Vec<StrategyAttempt>,
    /// Typed detail
    pub detail: Option<StepDetail>,
    /// Error, if the step failed
    pub error: Option<ReportedError>,
    /// Free-form notes
    pub notes: Vec<String>,
}

impl StepOutput {
    fn with_outcome(outcome: StepOutcome) -> Self {
        Self {
            outcome,
            strategy_used: None,
            trail: Vec::new(),
            detail: None,
            error: None,
            notes: Vec::new(),
        }
    }

    /// Successful step
    #[must_use]
    pub fn success() -> Self {
        Self::with_outcome(StepOutcome::Success)
    }

    /// Inconclusive step
    #[must_use]
    pub fn inconclusive() -> Self {
        Self::with_outcome(StepOutcome::Inconclusive)
    }

    /// Failed step; the error's trail is kept
    #[must_use]
    pub fn failure(err: &VerificarError) -> Self {
        let mut out = Self::with_outcome(StepOutcome::Failure);
        out.trail = err.trail().to_vec();
        out.error = Some(ReportedError::from(err));
        out
    }

    /// Record the winning strategy
    #[must_use]
    pub fn with_strategy(mut self, used: StrategyUsed) -> Self {
        self.strategy_used = Some(used);
        self
    }

    /// Record failed attempts that preceded success
    #[must_use]
    pub fn with_trail(mut self, trail: Vec<StrategyAttempt>) -> Self {
        self.trail = trail;
        self
    }

    /// Attach a typed detail
    #[must_use]
    pub fn with_detail(mut self, detail: StepDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Attach a note
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Record of one pipeline step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based, monotonic within a run
    pub index: usize,
    /// Step name, e.g. `ensure-locale`
    pub step_name: String,
    /// Outcome
    pub outcome: StepOutcome,
    /// Winning strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_used: Option<StrategyUsed>,
    /// Wall-clock time spent in the step body
    pub elapsed_ms: u64,
    /// Error, if the step failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportedError>,
    /// Failed strategy attempts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trail: Vec<StrategyAttempt>,
    /// Typed detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<StepDetail>,
    /// Screenshot and element-dump paths
    #[serde(default)]
    pub artifact_paths: Vec<PathBuf>,
    /// Notes, including diagnostics failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl StepResult {
    /// Build a result from a step body's output
    #[must_use]
    pub fn from_output(
        index: usize,
        step_name: impl Into<String>,
        output: StepOutput,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            index,
            step_name: step_name.into(),
            outcome: output.outcome,
            strategy_used: output.strategy_used,
            elapsed_ms,
            error: output.error,
            trail: output.trail,
            detail: output.detail,
            artifact_paths: Vec::new(),
            notes: output.notes,
        }
    }

    /// Classification carried by this step, if it is an assertion
    #[must_use]
    pub fn classification(&self) -> Option<Classification> {
        match &self.detail {
            Some(StepDetail::Classification(c)) => Some(c.classification),
            _ => None,
        }
    }

    /// Locale outcome carried by this step, if it is the locale step
    #[must_use]
    pub fn locale_outcome(&self) -> Option<&LocaleOutcome> {
        match &self.detail {
            Some(StepDetail::Locale(l)) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.step_name, self.outcome)?;
        match (&self.detail, &self.strategy_used, &self.error) {
            (_, _, Some(err)) => write!(f, "({})", err.kind),
            (Some(StepDetail::Locale(l)), _, None) => write!(f, "({l})"),
            (Some(StepDetail::Classification(c)), _, None) => write!(f, "({c})"),
            (None, Some(used), None) => write!(f, "({used})"),
            (None, None, None) => Ok(()),
        }
    }
}

/// Ordered step results plus the overall outcome of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    run_id: Uuid,
    locale: String,
    target: String,
    started_at: DateTime<Utc>,
    elapsed_ms: u64,
    fallback_policy: FallbackPolicy,
    outcome: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    classification: Option<Classification>,
    steps: Vec<StepResult>,
}

impl VerificationReport {
    /// Seal a run's steps into a report.
    ///
    /// The run passes only if every step succeeded and every
    /// classification is acceptable under `policy`.
    #[must_use]
    pub fn new(
        locale: impl Into<String>,
        target: impl Into<String>,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
        policy: FallbackPolicy,
        steps: Vec<StepResult>,
    ) -> Self {
        let passed = !steps.is_empty()
            && steps.iter().all(|s| {
                s.outcome.is_success() && s.classification().map_or(true, |c| policy.accepts(c))
            });
        let classification = steps
            .iter()
            .find(|s| s.step_name == crate::orchestrator::ASSERT_STEP)
            .and_then(StepResult::classification);
        Self {
            run_id: Uuid::new_v4(),
            locale: locale.into(),
            target: target.into(),
            started_at,
            elapsed_ms,
            fallback_policy: policy,
            outcome: if passed { StepOutcome::Success } else { StepOutcome::Failure },
            classification,
            steps,
        }
    }

    /// Unique run identifier
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Target locale code
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Navigation target name
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Run start time
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Total run time
    #[must_use]
    pub const fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Overall outcome, `Success` or `Failure`
    #[must_use]
    pub const fn outcome(&self) -> StepOutcome {
        self.outcome
    }

    /// Check if the run passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.outcome.is_success()
    }

    /// Classification of the primary assertion
    #[must_use]
    pub const fn classification(&self) -> Option<Classification> {
        self.classification
    }

    /// All steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// Find a step by name
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_name == name)
    }

    /// Steps that did not succeed
    #[must_use]
    pub fn failures(&self) -> Vec<&StepResult> {
        self.steps.iter().filter(|s| !s.outcome.is_success()).collect()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        let verdict = if self.passed() { "PASS" } else { "FAIL" };
        let classification = self
            .classification
            .map_or_else(|| "not asserted".to_string(), |c| c.to_string());
        format!(
            "{}/{}: {} ({} step(s), {})",
            self.locale,
            self.target,
            verdict,
            self.steps.len(),
            classification
        )
    }

    /// Pretty JSON document
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> VerificarResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One JSON object per step, newline-terminated
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json_lines(&self) -> VerificarResult<String> {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&serde_json::to_string(step)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Render JUnit XML, one testcase per step
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();
        let failures = self.failures().len();

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<testsuite name="{}" tests="{}" failures="{}" time="{:.3}">"#,
            escape_xml(&format!("{}/{}", self.locale, self.target)),
            self.steps.len(),
            failures,
            self.elapsed_ms as f64 / 1000.0
        ));
        xml.push('\n');

        for step in &self.steps {
            xml.push_str(&format!(
                r#"  <testcase name="{}" time="{:.3}">"#,
                escape_xml(&format!("{}-{}", step.index, step.step_name)),
                step.elapsed_ms as f64 / 1000.0
            ));
            xml.push('\n');
            if !step.outcome.is_success() {
                let message = step
                    .error
                    .as_ref()
                    .map_or_else(|| step.to_string(), |e| e.message.clone());
                xml.push_str(&format!(
                    r#"    <failure message="{}">{}</failure>"#,
                    escape_xml(&message),
                    escape_xml(&step.to_string())
                ));
                xml.push('\n');
            }
            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    /// Write `report.json`, `report.jsonl` and `junit.xml` into `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the directory or a file cannot be written
    pub fn write_to(&self, dir: &Path) -> VerificarResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let files = [
            (REPORT_JSON, self.to_json()?),
            (REPORT_JSONL, self.to_json_lines()?),
            (REPORT_JUNIT, self.render_junit()),
        ];
        let mut written = Vec::with_capacity(files.len());
        for (name, content) in files {
            let path = dir.join(name);
            std::fs::write(&path, content)?;
            written.push(path);
        }
        Ok(written)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(ToString::to_string).collect();
        write!(f, "[{}] {}", steps.join(", "), self.outcome)
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
