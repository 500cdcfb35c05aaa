//! Run configuration.
//!
//! A [`RunConfig`] is plain data: the locale to force, the feature to reach
//! and the texts to classify. It loads from YAML or JSON and is validated
//! before anything touches a browser.

use crate::asserter::{Classification, ExpectedText, FallbackPolicy, NamedExpectation};
use crate::driver::DriverConfig;
use crate::locale::{validate_locales, LocaleSpec};
use crate::navigator::NavigationTarget;
use crate::result::{VerificarError, VerificarResult};
use crate::wait::Timing;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default artifact directory
pub const DEFAULT_ARTIFACT_DIR: &str = "verificar-artifacts";

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACT_DIR)
}

fn default_order() -> Vec<Classification> {
    Classification::DEFAULT_ORDER.to_vec()
}

/// Everything one verification run needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// URL loaded before the pipeline starts
    pub base_url: String,
    /// Locale to force
    pub target_locale: LocaleSpec,
    /// Feature to reach
    pub navigation_target: NavigationTarget,
    /// Primary text classification
    pub expected_text: ExpectedText,
    /// Supplementary classifications, each its own step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_expect: Vec<NamedExpectation>,
    /// Where screenshots, dumps and reports go
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Browser context settings
    #[serde(default)]
    pub driver: DriverConfig,
    /// Delays and polling
    #[serde(default)]
    pub timing: Timing,
    /// How fallback-language text affects the overall outcome
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,
    /// Classification priority
    #[serde(default = "default_order")]
    pub order: Vec<Classification>,
}

impl RunConfig {
    /// Create a config with defaults for everything optional
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        target_locale: LocaleSpec,
        navigation_target: NavigationTarget,
        expected_text: ExpectedText,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            target_locale,
            navigation_target,
            expected_text,
            also_expect: Vec::new(),
            artifact_dir: default_artifact_dir(),
            driver: DriverConfig::default(),
            timing: Timing::default(),
            fallback_policy: FallbackPolicy::default(),
            order: default_order(),
        }
    }

    /// Add a supplementary classification
    #[must_use]
    pub fn also_expect(mut self, expectation: NamedExpectation) -> Self {
        self.also_expect.push(expectation);
        self
    }

    /// Set the artifact directory
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Set the browser context settings
    #[must_use]
    pub fn with_driver(mut self, driver: DriverConfig) -> Self {
        self.driver = driver;
        self
    }

    /// Set timing
    #[must_use]
    pub const fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Set the fallback policy
    #[must_use]
    pub const fn with_fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback_policy = policy;
        self
    }

    /// Set the classification priority
    #[must_use]
    pub fn with_order(mut self, order: Vec<Classification>) -> Self {
        self.order = order;
        self
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or has an
    /// unknown extension
    pub fn from_path(path: &Path) -> VerificarResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&raw),
            Some("json") => Ok(serde_json::from_str(&raw)?),
            _ => Err(VerificarError::config(format!(
                "{}: expected a .yaml, .yml or .json file",
                path.display()
            ))),
        }
    }

    /// Parse YAML
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is invalid
    pub fn from_yaml(yaml: &str) -> VerificarResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> VerificarResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check every data invariant
    ///
    /// # Errors
    ///
    /// Returns a config error describing the first violation
    pub fn validate(&self) -> VerificarResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(VerificarError::config("base_url is empty"));
        }
        if !self.base_url.contains("://") && self.base_url != "about:blank" {
            return Err(VerificarError::config(format!(
                "base_url {:?} has no scheme",
                self.base_url
            )));
        }
        self.target_locale.validate()?;
        self.navigation_target.validate()?;
        self.expected_text.validate()?;

        let mut names = HashSet::new();
        for expectation in &self.also_expect {
            expectation.validate()?;
            if !names.insert(expectation.name.as_str()) {
                return Err(VerificarError::config(format!(
                    "duplicate expectation name '{}'",
                    expectation.name
                )));
            }
        }

        if self.order.is_empty() {
            return Err(VerificarError::config("classification order is empty"));
        }
        let unique: HashSet<_> = self.order.iter().collect();
        if unique.len() != self.order.len() {
            return Err(VerificarError::config("classification order has duplicates"));
        }
        if self.driver.viewport_width == 0 || self.driver.viewport_height == 0 {
            return Err(VerificarError::config("viewport must be non-zero"));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(VerificarError::config("timing.poll_interval_ms must be non-zero"));
        }
        Ok(())
    }

    /// Name of this run: `{locale}-{target}`, made safe for a file name
    #[must_use]
    pub fn run_label(&self) -> String {
        format!("{}-{}", self.target_locale.code, self.navigation_target.name)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }

    /// Artifact directory of this run when it shares `artifact_dir` with others
    #[must_use]
    pub fn scoped_artifact_dir(&self) -> PathBuf {
        self.artifact_dir.join(self.run_label())
    }
}

/// Reject runs that would write into the same scoped artifact directory
///
/// # Errors
///
/// Returns a config error naming the shared directory
pub fn validate_run_dirs(configs: &[RunConfig]) -> VerificarResult<()> {
    let mut seen = HashSet::new();
    for config in configs {
        let dir = config.scoped_artifact_dir();
        if !seen.insert(dir.clone()) {
            return Err(VerificarError::config(format!(
                "two runs would share the artifact directory {}",
                dir.display()
            )));
        }
    }
    Ok(())
}

/// Validate several configs meant to run together
///
/// # Errors
///
/// Returns the first invalid config's error, a collision between locale
/// anchors, or two runs sharing an artifact directory
pub fn validate_all(configs: &[RunConfig]) -> VerificarResult<()> {
    for config in configs {
        config.validate()?;
    }
    let locales: Vec<&LocaleSpec> = configs.iter().map(|c| &c.target_locale).collect();
    validate_locales(&locales)?;
    validate_run_dirs(configs)
}

/// Built-in example configurations
pub mod presets {
    use super::*;
    use crate::strategy::LocatorStrategy;

    /// Region name used for the bottom navigation bar
    pub const BOTTOM_NAV: &str = "bottom-nav";

    /// Spanish meal scanner on a phone-sized viewport.
    ///
    /// The dashboard shows "Glucosa" only in Spanish. The language toggle
    /// is a button labelled with the current locale code. The scanner is
    /// reachable by label, by accessible name, through the quick-actions
    /// FAB, or as the third bottom-navigation button.
    #[must_use]
    pub fn meal_scanner_es() -> RunConfig {
        let locale = LocaleSpec::new("es", "Glucosa")
            .with_switch(LocatorStrategy::role("button", "EN"))
            .with_switch(
                LocatorStrategy::exact_text("Idioma").via(LocatorStrategy::aria_label("Settings")),
            )
            .with_menu_entry(LocatorStrategy::exact_text("Español"))
            .with_menu_entry(LocatorStrategy::role("option", "Español"))
            .with_menu_entry(LocatorStrategy::partial_text("Españ"));

        let target = NavigationTarget::new("meal-scanner")
            .then(LocatorStrategy::exact_text("Escanear Comida"))
            .then(LocatorStrategy::exact_text("Scan Meal"))
            .then(LocatorStrategy::aria_label("Scan Meal"))
            .then(
                LocatorStrategy::aria_label("Scan Meal")
                    .via(LocatorStrategy::aria_label("Quick Actions")),
            )
            .then(LocatorStrategy::positional(BOTTOM_NAV, 2));

        let expected = ExpectedText::new()
            .correct("Subir de la galería")
            .fallback("Upload from gallery");

        RunConfig::new("http://localhost:3000", locale, target, expected)
            .also_expect(NamedExpectation::new(
                "title",
                ExpectedText::new()
                    .correct("Escáner de Comidas")
                    .fallback("Meal Scanner"),
            ))
            .with_driver(DriverConfig::mobile().with_region(BOTTOM_NAV, "nav button"))
    }
}
