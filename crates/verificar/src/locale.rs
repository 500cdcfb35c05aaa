//! Locale-state reconciliation.
//!
//! [`LocaleResolver::ensure_locale`] is idempotent: if the target locale's
//! anchor text is already visible it does nothing. Otherwise it finds the
//! locale control, picks the target entry from whatever menu appears and
//! re-probes the anchor to confirm the switch took effect.

use crate::driver::PageDriver;
use crate::resolver::StrategyResolver;
use crate::result::{VerificarError, VerificarResult};
use crate::strategy::{
    validate_list, Action, AttemptFailure, LocatorStrategy, StrategyAttempt, StrategyKind,
    StrategyUsed,
};
use crate::wait::{poll_visible, PollSchedule, Probe, Timing};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accessible names that usually belong to a language picker
pub const LOCALE_CONTROL_PATTERN: &str =
    r"(?i:\b(?:language|languages|idioma|idiomas|langue|sprache|lingua|locale)\b)|^[A-Z]{2}$";

const fn default_true() -> bool {
    true
}

/// Everything needed to detect and switch to one locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleSpec {
    /// Locale code, e.g. `es`
    pub code: String,
    /// Text that is only visible when this locale is active
    pub anchor_probe_text: String,
    /// Ways to open the locale control, most specific first
    #[serde(default)]
    pub switch_strategies: Vec<LocatorStrategy>,
    /// Ways to pick this locale once the control is open
    pub menu_entry_strategies: Vec<LocatorStrategy>,
    /// Fall back to scanning visible controls for a language picker
    #[serde(default = "default_true")]
    pub use_heuristic: bool,
    /// Override for [`LOCALE_CONTROL_PATTERN`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heuristic_pattern: Option<String>,
}

impl LocaleSpec {
    /// Create a spec with no strategies yet
    #[must_use]
    pub fn new(code: impl Into<String>, anchor_probe_text: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            anchor_probe_text: anchor_probe_text.into(),
            switch_strategies: Vec::new(),
            menu_entry_strategies: Vec::new(),
            use_heuristic: true,
            heuristic_pattern: None,
        }
    }

    /// Append a switch strategy
    #[must_use]
    pub fn with_switch(mut self, strategy: LocatorStrategy) -> Self {
        self.switch_strategies.push(strategy);
        self
    }

    /// Append a menu entry strategy
    #[must_use]
    pub fn with_menu_entry(mut self, strategy: LocatorStrategy) -> Self {
        self.menu_entry_strategies.push(strategy);
        self
    }

    /// Disable the locale-control heuristic
    #[must_use]
    pub const fn without_heuristic(mut self) -> Self {
        self.use_heuristic = false;
        self
    }

    /// Use a custom heuristic pattern
    #[must_use]
    pub fn with_heuristic_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.heuristic_pattern = Some(pattern.into());
        self
    }

    /// Compiled heuristic pattern
    ///
    /// # Errors
    ///
    /// Returns a config error if the pattern does not compile.
    pub fn heuristic_regex(&self) -> VerificarResult<Regex> {
        let pattern = self.heuristic_pattern.as_deref().unwrap_or(LOCALE_CONTROL_PATTERN);
        Regex::new(pattern)
            .map_err(|e| VerificarError::config(format!("invalid heuristic pattern: {e}")))
    }

    /// Check the locale's invariants
    ///
    /// # Errors
    ///
    /// Returns a config error describing the first violation.
    pub fn validate(&self) -> VerificarResult<()> {
        if self.code.trim().is_empty() {
            return Err(VerificarError::config("locale code is empty"));
        }
        if self.anchor_probe_text.trim().is_empty() {
            return Err(VerificarError::config(format!(
                "locale '{}' has an empty anchor probe text",
                self.code
            )));
        }
        if self.switch_strategies.is_empty() && !self.use_heuristic {
            return Err(VerificarError::config(format!(
                "locale '{}' has no switch strategies and the heuristic is disabled",
                self.code
            )));
        }
        for strategy in &self.switch_strategies {
            strategy.validate().map_err(|e| {
                VerificarError::config(format!("locale '{}' switch: {e}", self.code))
            })?;
        }
        validate_list(&format!("locale '{}' menu entry", self.code), &self.menu_entry_strategies)?;
        self.heuristic_regex()?;
        Ok(())
    }
}

/// Reject locales whose anchors could confirm each other
///
/// # Errors
///
/// Returns a config error naming the first colliding pair.
pub fn validate_locales(locales: &[&LocaleSpec]) -> VerificarResult<()> {
    for (i, a) in locales.iter().enumerate() {
        for b in &locales[i + 1..] {
            if a.code == b.code {
                continue;
            }
            if a.anchor_probe_text.trim() == b.anchor_probe_text.trim() {
                return Err(VerificarError::config(format!(
                    "locales '{}' and '{}' share the anchor probe text {:?}",
                    a.code, b.code, a.anchor_probe_text
                )));
            }
        }
    }
    Ok(())
}

/// How the locale was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocaleOutcome {
    /// The anchor was already visible; nothing was clicked
    AlreadyActive,
    /// The locale was switched
    Switched {
        /// Strategy that opened the locale control
        via: StrategyUsed,
        /// Strategy that selected the locale
        entry: StrategyUsed,
    },
}

impl LocaleOutcome {
    /// Whether nothing had to be done
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::AlreadyActive)
    }
}

impl fmt::Display for LocaleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive => f.write_str("no-op"),
            Self::Switched { via, entry } => write!(f, "switched via {via}, selected {entry}"),
        }
    }
}

/// Successful locale reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredLocale {
    /// What happened
    pub outcome: LocaleOutcome,
    /// Strategies that failed on the way
    pub trail: Vec<StrategyAttempt>,
}

/// Detects the active locale and switches it when needed
pub struct LocaleResolver<'a> {
    page: &'a dyn PageDriver,
    timing: Timing,
}

impl fmt::Debug for LocaleResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocaleResolver")
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl<'a> LocaleResolver<'a> {
    /// Create a resolver over `page`
    #[must_use]
    pub const fn new(page: &'a dyn PageDriver, timing: Timing) -> Self {
        Self { page, timing }
    }

    async fn anchor_visible(&self, spec: &LocaleSpec) -> Probe {
        let schedule = PollSchedule::new(self.timing.anchor_probe_ms, self.timing.poll_interval_ms);
        poll_visible(self.page, &StrategyKind::exact_text(&spec.anchor_probe_text), schedule).await
    }

    /// Make `spec` the active locale.
    ///
    /// # Errors
    ///
    /// [`VerificarError::LocaleSwitchFailed`] with the accumulated trail if
    /// no control could be opened, no entry selected, or the anchor is still
    /// missing after selection.
    pub async fn ensure_locale(&self, spec: &LocaleSpec) -> VerificarResult<EnsuredLocale> {
        if self.anchor_visible(spec).await.is_visible() {
            tracing::debug!(locale = %spec.code, "locale already active");
            return Ok(EnsuredLocale {
                outcome: LocaleOutcome::AlreadyActive,
                trail: Vec::new(),
            });
        }

        tracing::info!(locale = %spec.code, "anchor not visible, switching locale");
        let resolver = StrategyResolver::new(self.page, self.timing);
        let mut trail = Vec::new();
        let failed = |trail: Vec<StrategyAttempt>| VerificarError::LocaleSwitchFailed {
            locale: spec.code.clone(),
            trail,
        };

        let via = match resolver.resolve(&spec.switch_strategies, Action::Click).await {
            Ok(res) => {
                trail.extend(res.trail);
                res.strategy_used
            }
            Err(e) => {
                trail.extend(e.trail().iter().cloned());
                match self.heuristic_switch(spec, &resolver).await? {
                    Ok(res) => {
                        trail.extend(res.trail);
                        res.strategy_used
                    }
                    Err(more) => {
                        trail.extend(more);
                        return Err(failed(trail));
                    }
                }
            }
        };
        self.page.wait(self.timing.menu_settle_ms).await;

        let entry = match resolver.resolve(&spec.menu_entry_strategies, Action::Click).await {
            Ok(res) => {
                trail.extend(res.trail);
                res.strategy_used
            }
            Err(e) => {
                trail.extend(e.trail().iter().cloned());
                return Err(failed(trail));
            }
        };
        self.page.wait(self.timing.settle_ms).await;

        let failure = match self.anchor_visible(spec).await {
            Probe::Visible(_) => {
                tracing::info!(locale = %spec.code, via = %via, entry = %entry, "locale switched");
                return Ok(EnsuredLocale {
                    outcome: LocaleOutcome::Switched { via, entry },
                    trail,
                });
            }
            Probe::Hidden => AttemptFailure::NotVisible,
            Probe::Absent => AttemptFailure::NotLocated,
            Probe::Failed(m) => AttemptFailure::Driver(m),
        };
        trail.push(StrategyAttempt::new(
            format!("anchor {}", StrategyKind::exact_text(&spec.anchor_probe_text)),
            failure,
            self.timing.anchor_probe_ms,
        ));
        tracing::warn!(locale = %spec.code, "anchor still missing after selecting locale");
        Err(failed(trail))
    }

    /// Scan visible controls for a language picker.
    ///
    /// The outer result carries configuration errors; the inner one is the
    /// resolution or the attempts it made.
    async fn heuristic_switch(
        &self,
        spec: &LocaleSpec,
        resolver: &StrategyResolver<'_>,
    ) -> VerificarResult<Result<crate::resolver::Resolution, Vec<StrategyAttempt>>> {
        if !spec.use_heuristic {
            return Ok(Err(Vec::new()));
        }
        let pattern = spec.heuristic_regex()?;
        let elements = match self.page.list_interactive_elements().await {
            Ok(elements) => elements,
            Err(e) => {
                return Ok(Err(vec![StrategyAttempt::new(
                    "locale-control heuristic",
                    AttemptFailure::Driver(e.to_string()),
                    0,
                )]));
            }
        };

        let candidates: Vec<LocatorStrategy> = elements
            .iter()
            .filter(|el| pattern.is_match(el.accessible_name.trim()))
            .map(|el| {
                LocatorStrategy::role(el.role.clone(), el.accessible_name.clone()).with_timeout(0)
            })
            .collect();
        tracing::debug!(candidates = candidates.len(), "locale-control heuristic");

        if candidates.is_empty() {
            return Ok(Err(vec![StrategyAttempt::new(
                "locale-control heuristic",
                AttemptFailure::NotLocated,
                0,
            )]));
        }
        Ok(resolver
            .resolve(&candidates, Action::Click)
            .await
            .map_err(|e| e.trail().to_vec()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockPage};
    use crate::strategy::StrategyKindName;

    fn spanish() -> LocaleSpec {
        LocaleSpec::new("es", "Glucosa")
            .with_switch(LocatorStrategy::role("button", "EN").with_timeout(100))
            .with_menu_entry(LocatorStrategy::exact_text("Español").with_timeout(100))
    }

    /// English page whose "EN" toggle opens a menu; picking "Español"
    /// swaps the dashboard labels.
    fn english_page() -> MockPage {
        MockPage::new()
            .with(MockElement::text("Glucose").id("label-en"))
            .with(MockElement::text("Glucosa").id("label-es").hidden())
            .with(MockElement::button("EN").reveals("Español"))
            .with(
                MockElement::button("Español")
                    .hidden()
                    .reveals("label-es")
                    .conceals("label-en")
                    .conceals("Español"),
            )
    }

    mod ensure_tests {
        use super::*;

        #[tokio::test]
        async fn test_already_active_is_noop() {
            let page = MockPage::new()
                .with(MockElement::text("Glucosa"))
                .with(MockElement::button("EN"))
                .into_session();
            let resolver = LocaleResolver::new(&page, Timing::instant());
            let ensured = resolver.ensure_locale(&spanish()).await.unwrap();
            assert!(ensured.outcome.is_noop());
            assert_eq!(page.click_count("EN"), 0);
        }

        #[tokio::test]
        async fn test_switch_then_confirm() {
            let page = english_page().into_session();
            let resolver = LocaleResolver::new(&page, Timing::instant());
            let ensured = resolver.ensure_locale(&spanish()).await.unwrap();
            match ensured.outcome {
                LocaleOutcome::Switched { via, entry } => {
                    assert_eq!(via.kind, StrategyKindName::Role);
                    assert_eq!(entry.label, "exact-text \"Español\"");
                }
                LocaleOutcome::AlreadyActive => panic!("expected a switch"),
            }
            assert!(page.is_shown("label-es"));
        }

        #[tokio::test]
        async fn test_second_call_does_not_switch_again() {
            let page = english_page().into_session();
            let resolver = LocaleResolver::new(&page, Timing::instant());
            let spec = spanish();
            let first = resolver.ensure_locale(&spec).await.unwrap();
            let second = resolver.ensure_locale(&spec).await.unwrap();
            assert!(!first.outcome.is_noop());
            assert!(second.outcome.is_noop());
            assert_eq!(page.click_count("EN"), 1);
            assert_eq!(page.click_count("Español"), 1);
        }

        #[tokio::test]
        async fn test_no_control_fails_with_trail() {
            let page = MockPage::new().with(MockElement::text("Glucose")).into_session();
            let resolver = LocaleResolver::new(&page, Timing::instant());
            let err = resolver.ensure_locale(&spanish()).await.unwrap_err();
            assert_eq!(err.kind(), "locale_switch_failed");
            let trail = err.trail();
            assert!(trail.iter().any(|a| a.strategy.contains("EN")));
            assert!(trail.iter().any(|a| a.strategy == "locale-control heuristic"));
        }

        #[tokio::test]
        async fn test_missing_entry_fails() {
            let page = MockPage::new()
                .with(MockElement::text("Glucose"))
                .with(MockElement::button("EN"))
                .into_session();
            let resolver = LocaleResolver::new(&page, Timing::instant());
            let err = resolver.ensure_locale(&spanish()).await.unwrap_err();
            assert!(err.trail().iter().any(|a| a.strategy.contains("Español")));
        }

        #[tokio::test]
        async fn test_anchor_still_missing_after_selection() {
            let page = MockPage::new()
                .with(MockElement::text("Glucose"))
                .with(MockElement::button("EN").reveals("Español"))
                .with(MockElement::button("Español").hidden())
                .into_session();
            let resolver = LocaleResolver::new(&page, Timing::instant());
            let err = resolver.ensure_locale(&spanish()).await.unwrap_err();
            let last = err.trail().last().unwrap();
            assert!(last.strategy.starts_with("anchor"));
            assert_eq!(last.failure, AttemptFailure::NotLocated);
        }

        #[tokio::test]
        async fn test_settings_path_via_opener() {
            let page = MockPage::new()
                .with(MockElement::text("Glucose").id("label-en"))
                .with(MockElement::text("Glucosa").id("label-es").hidden())
                .with(MockElement::icon_button("Profile").reveals("Settings"))
                .with(MockElement::link("Settings").hidden().reveals("Español"))
                .with(MockElement::button("Español").hidden().reveals("label-es"))
                .into_session();
            let spec = LocaleSpec::new("es", "Glucosa")
                .with_switch(LocatorStrategy::role("button", "EN").with_timeout(50))
                .with_switch(
                    LocatorStrategy::exact_text("Settings")
                        .with_timeout(50)
                        .via(LocatorStrategy::aria_label("Profile").with_timeout(50)),
                )
                .with_menu_entry(LocatorStrategy::exact_text("Español").with_timeout(50));
            let resolver = LocaleResolver::new(&page, Timing::instant());
            let ensured = resolver.ensure_locale(&spec).await.unwrap();
            match ensured.outcome {
                LocaleOutcome::Switched { via, .. } => assert_eq!(via.position, 2),
                LocaleOutcome::AlreadyActive => panic!("expected a switch"),
            }
            assert_eq!(ensured.trail.len(), 1);
        }
    }

    mod heuristic_tests {
        use super::*;

        #[tokio::test]
        async fn test_heuristic_finds_language_button() {
            let page = MockPage::new()
                .with(MockElement::text("Glucose").id("label-en"))
                .with(MockElement::text("Glucosa").id("label-es").hidden())
                .with(MockElement::button("Dashboard"))
                .with(MockElement::icon_button("Language").reveals("Español"))
                .with(MockElement::button("Español").hidden().reveals("label-es"))
                .into_session();
            let spec = LocaleSpec::new("es", "Glucosa")
                .with_switch(LocatorStrategy::role("button", "EN").with_timeout(50))
                .with_menu_entry(LocatorStrategy::exact_text("Español").with_timeout(50));
            let resolver = LocaleResolver::new(&page, Timing::instant());
            let ensured = resolver.ensure_locale(&spec).await.unwrap();
            match ensured.outcome {
                LocaleOutcome::Switched { via, .. } => {
                    assert_eq!(via.label, "role button[name=\"Language\"]");
                }
                LocaleOutcome::AlreadyActive => panic!("expected a switch"),
            }
        }

        #[tokio::test]
        async fn test_heuristic_disabled() {
            let page = MockPage::new()
                .with(MockElement::icon_button("Language"))
                .into_session();
            let spec = spanish().without_heuristic();
            let resolver = LocaleResolver::new(&page, Timing::instant());
            let err = resolver.ensure_locale(&spec).await.unwrap_err();
            assert!(!page.was_called("list_interactive_elements"));
            assert_eq!(err.trail().len(), 1);
        }

        #[test]
        fn test_default_pattern() {
            let re = LocaleSpec::new("es", "Glucosa").heuristic_regex().unwrap();
            assert!(re.is_match("Language"));
            assert!(re.is_match("Cambiar idioma"));
            assert!(re.is_match("EN"));
            assert!(!re.is_match("Scan Meal"));
            assert!(!re.is_match("Settings"));
            assert!(!re.is_match("ok"));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_valid_spec() {
            assert!(spanish().validate().is_ok());
        }

        #[test]
        fn test_empty_anchor_rejected() {
            let mut spec = spanish();
            spec.anchor_probe_text = " ".to_string();
            assert!(spec.validate().is_err());
        }

        #[test]
        fn test_missing_menu_entries_rejected() {
            let spec =
                LocaleSpec::new("es", "Glucosa").with_switch(LocatorStrategy::role("button", "EN"));
            assert!(spec.validate().is_err());
        }

        #[test]
        fn test_bad_pattern_rejected() {
            assert!(spanish().with_heuristic_pattern("(").validate().is_err());
        }

        #[test]
        fn test_colliding_anchors() {
            let es = spanish();
            let pt = LocaleSpec::new("pt", "Glucosa");
            let en = LocaleSpec::new("en", "Glucose");
            assert!(validate_locales(&[&es, &en]).is_ok());
            let err = validate_locales(&[&es, &en, &pt]).unwrap_err();
            assert!(err.to_string().contains("'es' and 'pt'"));
        }
    }
}
