//! Verificar: resilient locale verification for web UIs
//!
//! Verificar (Spanish: "to verify") forces a web application into a target
//! locale, reaches a feature through an ordered list of locator strategies
//! and classifies the text it finds as correct, fallback-language or
//! unknown. Every step leaves a screenshot and an element dump behind.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ LocaleResolver │──►│  Navigator   │──►│     Asserter     │
//! │ ensure_locale  │   │ navigate_to  │   │ assert_displayed │
//! └───────┬────────┘   └──────┬───────┘   └────────┬─────────┘
//!         └─────────────┬─────┴────────────────────┘
//!                       ▼
//!             ┌──────────────────┐      ┌─────────────────────┐
//!             │ StrategyResolver │─────►│ PageDriver (mock or │
//!             │ ordered fallback │      │ chromium over CDP)  │
//!             └──────────────────┘      └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use verificar::{presets, run, MockDriver, MockPage};
//!
//! # async fn demo() {
//! let config = presets::meal_scanner_es();
//! let driver = MockDriver::new(MockPage::happy_path(&config));
//! let report = run(&driver, &config).await;
//! println!("{}", report.summary());
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Classifying displayed text
pub mod asserter;
/// Run configuration and presets
pub mod config;
/// Per-step screenshots and element dumps
pub mod diagnostics;
/// Browser driver seam
pub mod driver;
/// Forcing the target locale
pub mod locale;
/// Scriptable in-memory driver
pub mod mock;
/// Reaching a feature
pub mod navigator;
/// Step sequencing
pub mod orchestrator;
/// Step results and run reports
pub mod report;
/// Ordered fallback resolution
pub mod resolver;
mod result;
/// Locator strategies
pub mod strategy;
/// Delays and polling
pub mod wait;

/// Chromium driver over CDP
#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod browser;

pub use asserter::{
    Asserter, Classification, ClassificationResult, ExpectedText, ExpectedTextVariant,
    FallbackPolicy, NamedExpectation,
};
#[cfg(feature = "browser")]
pub use browser::{ChromiumDriver, ChromiumPage};
pub use config::{presets, validate_all, validate_run_dirs, RunConfig, DEFAULT_ARTIFACT_DIR};
pub use diagnostics::{artifact_name, DiagnosticsCapturer};
pub use driver::{Driver, DriverConfig, ElementHandle, InteractiveElement, PageDriver};
pub use locale::{EnsuredLocale, LocaleOutcome, LocaleResolver, LocaleSpec};
pub use mock::{ClickBehavior, MockDriver, MockElement, MockPage, MockSession};
pub use navigator::{NavigationTarget, Navigator};
pub use orchestrator::{run, verify_all, Orchestrator, RunState};
pub use report::{
    ReportedError, StepDetail, StepOutcome, StepOutput, StepResult, VerificationReport,
};
pub use resolver::{Resolution, StrategyResolver};
pub use result::{VerificarError, VerificarResult};
pub use strategy::{
    Action, AttemptFailure, LocatorStrategy, StrategyAttempt, StrategyKind, StrategyUsed,
};
pub use wait::Timing;
