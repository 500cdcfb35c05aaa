//! The fixed verification pipeline.
//!
//! ```text
//! Init ──ensure-locale──► LocaleEnsured ──navigate──► Navigated ──assert──► Asserted ──► Done
//!   │                          │
//!   └── LocaleSwitchFailed ────┴── NavigationFailed ─────────────────────────────────► Done
//! ```
//!
//! Every transition runs inside [`DiagnosticsCapturer::wrap`]. A failed
//! locale switch or navigation skips the remaining steps, but a report is
//! always returned.

use crate::asserter::{Asserter, Classification, ClassificationResult, ExpectedText, FallbackPolicy};
use crate::config::{validate_run_dirs, RunConfig};
use crate::diagnostics::DiagnosticsCapturer;
use crate::driver::{Driver, PageDriver};
use crate::locale::{validate_locales, LocaleResolver};
use crate::navigator::Navigator;
use crate::report::{StepDetail, StepOutput, StepResult, VerificationReport};
use crate::resolver::elapsed_ms;
use crate::result::VerificarError;
use chrono::Utc;
use std::time::Instant;

/// Reported only when the app could not be opened or loaded
pub const OPEN_STEP: &str = "open-app";
/// Reported only when the config is invalid
pub const VALIDATE_STEP: &str = "validate-config";
/// Locale reconciliation step
pub const LOCALE_STEP: &str = "ensure-locale";
/// Navigation step
pub const NAVIGATE_STEP: &str = "navigate";
/// Primary assertion step
pub const ASSERT_STEP: &str = "assert-displayed";

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Page loaded, nothing verified yet
    Init,
    /// Target locale is active
    LocaleEnsured,
    /// Target feature is on screen
    Navigated,
    /// Assertions ran
    Asserted,
    /// Finished, successfully or not
    Done,
}

/// Drives one loaded page through the pipeline
pub struct Orchestrator<'a> {
    page: &'a dyn PageDriver,
    config: &'a RunConfig,
    capturer: DiagnosticsCapturer<'a>,
    steps: Vec<StepResult>,
    state: RunState,
}

impl std::fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over an already loaded page
    #[must_use]
    pub fn new(page: &'a dyn PageDriver, config: &'a RunConfig) -> Self {
        Self {
            page,
            config,
            capturer: DiagnosticsCapturer::new(page, config.artifact_dir.clone()),
            steps: Vec::new(),
            state: RunState::Init,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Run until `Done` and return the step results
    pub async fn execute(mut self) -> Vec<StepResult> {
        loop {
            self.state = match self.state {
                RunState::Init => self.ensure_locale().await,
                RunState::LocaleEnsured => self.navigate().await,
                RunState::Navigated => self.assert().await,
                RunState::Asserted => RunState::Done,
                RunState::Done => break,
            };
            tracing::debug!(state = ?self.state, "pipeline transition");
        }
        self.steps
    }

    /// Record a failure for the page load itself
    pub async fn fail_open(mut self, err: &VerificarError) -> Vec<StepResult> {
        let step = self.capturer.wrap(OPEN_STEP, async { StepOutput::failure(err) }).await;
        self.steps.push(step);
        self.state = RunState::Done;
        self.steps
    }

    async fn ensure_locale(&mut self) -> RunState {
        let resolver = LocaleResolver::new(self.page, self.config.timing);
        let spec = &self.config.target_locale;
        let step = self
            .capturer
            .wrap(LOCALE_STEP, async {
                match resolver.ensure_locale(spec).await {
                    Ok(ensured) => StepOutput::success()
                        .with_trail(ensured.trail)
                        .with_detail(StepDetail::Locale(ensured.outcome)),
                    Err(e) => StepOutput::failure(&e),
                }
            })
            .await;
        self.advance(step, RunState::LocaleEnsured)
    }

    async fn navigate(&mut self) -> RunState {
        let navigator = Navigator::new(self.page, self.config.timing);
        let target = &self.config.navigation_target;
        let step = self
            .capturer
            .wrap(NAVIGATE_STEP, async {
                match navigator.navigate_to(target).await {
                    Ok(res) => StepOutput::success()
                        .with_strategy(res.strategy_used)
                        .with_trail(res.trail),
                    Err(e) => StepOutput::failure(&e),
                }
            })
            .await;
        self.advance(step, RunState::Navigated)
    }

    async fn assert(&mut self) -> RunState {
        let config = self.config;
        let primary = self.classify(ASSERT_STEP, &config.expected_text).await;
        self.steps.push(primary);
        for expectation in &config.also_expect {
            let step = self.classify(&expectation.step_name(), &expectation.expected).await;
            self.steps.push(step);
        }
        RunState::Asserted
    }

    async fn classify(&mut self, step_name: &str, expected: &ExpectedText) -> StepResult {
        let asserter = Asserter::new(self.page, self.config.timing);
        let order = &self.config.order;
        let policy = self.config.fallback_policy;
        self.capturer
            .wrap(step_name, async {
                let result = asserter.assert_displayed(expected, order).await;
                classification_output(result, policy)
            })
            .await
    }

    fn advance(&mut self, step: StepResult, next: RunState) -> RunState {
        let ok = step.outcome.is_success();
        self.steps.push(step);
        if ok {
            next
        } else {
            RunState::Done
        }
    }
}

/// Map a classification onto a step outcome.
///
/// Correct and fallback-language text both mean the step ran; the fallback
/// policy decides the overall outcome. A matched unknown variant is
/// inconclusive. Nothing visible is an [`VerificarError::AssertionUnknown`].
fn classification_output(result: ClassificationResult, policy: FallbackPolicy) -> StepOutput {
    let output = match (result.classification, &result.matched_text) {
        (Classification::Correct, _) => StepOutput::success(),
        (Classification::FallbackLanguage, Some(text)) => {
            let output = StepOutput::success();
            if policy == FallbackPolicy::Warn {
                tracing::warn!(text = %text, "fallback-language text accepted");
                output.with_note(format!("fallback-language text {text:?} accepted by policy"))
            } else {
                output
            }
        }
        (Classification::Unknown, Some(text)) => {
            StepOutput::inconclusive().with_note(format!("unrecognised text {text:?} visible"))
        }
        (_, None) => StepOutput::failure(&VerificarError::AssertionUnknown {
            note: result
                .note
                .clone()
                .unwrap_or_else(|| "nothing matched".to_string()),
        }),
    };
    output.with_detail(StepDetail::Classification(result))
}

fn config_failure(config: &RunConfig, err: &VerificarError) -> VerificationReport {
    let step = StepResult::from_output(1, VALIDATE_STEP, StepOutput::failure(err), 0);
    VerificationReport::new(
        &config.target_locale.code,
        &config.navigation_target.name,
        Utc::now(),
        0,
        config.fallback_policy,
        vec![step],
    )
}

/// Run one verification and return its report.
///
/// Never fails: configuration, launch and load errors are reported as a
/// single failed step.
pub async fn run<D: Driver>(driver: &D, config: &RunConfig) -> VerificationReport {
    if let Err(e) = config.validate() {
        tracing::warn!(error = %e, "invalid run config");
        return config_failure(config, &e);
    }

    let started_at = Utc::now();
    let start = Instant::now();
    let locale = &config.target_locale.code;
    let target = &config.navigation_target.name;
    tracing::info!(%locale, %target, url = %config.base_url, "starting verification");

    let steps = match driver.open_context(&config.driver).await {
        Err(e) => {
            tracing::warn!(error = %e, "could not open browsing context");
            vec![StepResult::from_output(1, OPEN_STEP, StepOutput::failure(&e), elapsed_ms(start))]
        }
        Ok(page) => {
            let steps = match page.goto(&config.base_url).await {
                Ok(()) => {
                    page.wait(config.timing.initial_load_ms).await;
                    Orchestrator::new(&page, config).execute().await
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not load base url");
                    Orchestrator::new(&page, config).fail_open(&e).await
                }
            };
            if let Err(e) = page.close().await {
                tracing::warn!(error = %e, "closing browsing context failed");
            }
            steps
        }
    };

    let report = VerificationReport::new(
        locale,
        target,
        started_at,
        elapsed_ms(start),
        config.fallback_policy,
        steps,
    );
    tracing::info!(summary = %report.summary(), "verification finished");
    report
}

/// Run several verifications concurrently, one browsing context each.
///
/// Each run's artifacts go to `{artifact_dir}/{locale}-{target}`. Reports
/// come back in input order. Colliding locale anchors or two runs sharing
/// an artifact directory fail every run up front.
pub async fn verify_all<D: Driver>(driver: &D, configs: &[RunConfig]) -> Vec<VerificationReport> {
    let locales: Vec<_> = configs.iter().map(|c| &c.target_locale).collect();
    if let Err(e) = validate_locales(&locales).and_then(|()| validate_run_dirs(configs)) {
        return configs.iter().map(|c| config_failure(c, &e)).collect();
    }

    let scoped: Vec<RunConfig> = configs
        .iter()
        .map(|c| c.clone().with_artifact_dir(c.scoped_artifact_dir()))
        .collect();
    futures::future::join_all(scoped.iter().map(|c| run(driver, c))).await
}
