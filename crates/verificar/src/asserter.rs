//! Classification of visible text against expected variants.
//!
//! "Nothing visible" and "wrong-language text visible" are distinct
//! outcomes: the first is a navigation or rendering problem, the second a
//! translation regression.

use crate::driver::PageDriver;
use crate::result::{VerificarError, VerificarResult};
use crate::strategy::StrategyKind;
use crate::wait::{poll_visible, PollSchedule, Probe, Timing};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of assertion outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The target-locale text is shown
    Correct,
    /// A known other-language text is shown
    FallbackLanguage,
    /// Neither; possibly a raw key or placeholder
    Unknown,
}

impl Classification {
    /// Usual priority: correct, then fallback, then unknown
    pub const DEFAULT_ORDER: [Self; 3] = [Self::Correct, Self::FallbackLanguage, Self::Unknown];
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Correct => "correct",
            Self::FallbackLanguage => "fallback-language",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// How a fallback-language classification affects the overall outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Anything but `Correct` fails the run
    #[default]
    Fail,
    /// `FallbackLanguage` passes with a warning
    Warn,
}

impl FallbackPolicy {
    /// Whether `classification` is acceptable for an overall success
    #[must_use]
    pub const fn accepts(self, classification: Classification) -> bool {
        match classification {
            Classification::Correct => true,
            Classification::FallbackLanguage => matches!(self, Self::Warn),
            Classification::Unknown => false,
        }
    }
}

/// One expected string and what seeing it means
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedTextVariant {
    /// Meaning of a match
    pub classification: Classification,
    /// Exact text to look for
    pub text: String,
}

impl ExpectedTextVariant {
    /// Create a variant
    #[must_use]
    pub fn new(classification: Classification, text: impl Into<String>) -> Self {
        Self {
            classification,
            text: text.into(),
        }
    }
}

/// Table of expected variants
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedText {
    variants: Vec<ExpectedTextVariant>,
}

impl ExpectedText {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target-locale text
    #[must_use]
    pub fn correct(mut self, text: impl Into<String>) -> Self {
        self.variants.push(ExpectedTextVariant::new(Classification::Correct, text));
        self
    }

    /// Add a fallback-language text
    #[must_use]
    pub fn fallback(mut self, text: impl Into<String>) -> Self {
        self.variants
            .push(ExpectedTextVariant::new(Classification::FallbackLanguage, text));
        self
    }

    /// Add a text that is recognisably wrong, such as a raw i18n key
    #[must_use]
    pub fn unknown(mut self, text: impl Into<String>) -> Self {
        self.variants.push(ExpectedTextVariant::new(Classification::Unknown, text));
        self
    }

    /// All variants in insertion order
    #[must_use]
    pub fn variants(&self) -> &[ExpectedTextVariant] {
        &self.variants
    }

    /// Texts for one classification
    pub fn texts_for(&self, classification: Classification) -> impl Iterator<Item = &str> {
        self.variants
            .iter()
            .filter(move |v| v.classification == classification)
            .map(|v| v.text.as_str())
    }

    /// Target-locale texts
    pub fn correct_texts(&self) -> impl Iterator<Item = &str> {
        self.texts_for(Classification::Correct)
    }

    /// Check that there is at least one correct text and none is blank
    ///
    /// # Errors
    ///
    /// Returns a config error describing the problem.
    pub fn validate(&self) -> VerificarResult<()> {
        if self.correct_texts().next().is_none() {
            return Err(VerificarError::config("expected text needs at least one correct variant"));
        }
        if let Some(blank) = self.variants.iter().find(|v| v.text.trim().is_empty()) {
            return Err(VerificarError::config(format!(
                "expected text has a blank {} variant",
                blank.classification
            )));
        }
        Ok(())
    }
}

impl FromIterator<ExpectedTextVariant> for ExpectedText {
    fn from_iter<I: IntoIterator<Item = ExpectedTextVariant>>(iter: I) -> Self {
        Self {
            variants: iter.into_iter().collect(),
        }
    }
}

/// A supplementary content check, reported as its own step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedExpectation {
    /// Step suffix; the step is called `assert-<name>`
    pub name: String,
    /// Variants to classify
    pub expected: ExpectedText,
}

impl NamedExpectation {
    /// Create a named expectation
    #[must_use]
    pub fn new(name: impl Into<String>, expected: ExpectedText) -> Self {
        Self {
            name: name.into(),
            expected,
        }
    }

    /// Step name used in reports and artifact file names
    #[must_use]
    pub fn step_name(&self) -> String {
        format!("assert-{}", self.name)
    }

    /// Check the name is usable in a file name and the table is valid
    ///
    /// # Errors
    ///
    /// Returns a config error describing the problem.
    pub fn validate(&self) -> VerificarResult<()> {
        let usable = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !usable {
            return Err(VerificarError::config(format!(
                "expectation name {:?} must be non-empty ASCII letters, digits, '-' or '_'",
                self.name
            )));
        }
        self.expected
            .validate()
            .map_err(|e| VerificarError::config(format!("expectation '{}': {e}", self.name)))
    }
}

/// Result of one classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Winning classification
    pub classification: Classification,
    /// The text that was seen, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    /// Explanation when nothing matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ClassificationResult {
    /// Whether anything was visible at all
    #[must_use]
    pub const fn matched(&self) -> bool {
        self.matched_text.is_some()
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matched_text {
            Some(text) => write!(f, "{} ({text:?})", self.classification),
            None => write!(f, "{} (nothing matched)", self.classification),
        }
    }
}

/// Classifies visible text
pub struct Asserter<'a> {
    page: &'a dyn PageDriver,
    timing: Timing,
}

impl fmt::Debug for Asserter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asserter")
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl<'a> Asserter<'a> {
    /// Create an asserter over `page`
    #[must_use]
    pub const fn new(page: &'a dyn PageDriver, timing: Timing) -> Self {
        Self { page, timing }
    }

    /// Return the first classification in `order` with a visible text.
    ///
    /// Never fails: a total miss is `Unknown` with no matched text.
    pub async fn assert_displayed(
        &self,
        expected: &ExpectedText,
        order: &[Classification],
    ) -> ClassificationResult {
        let schedule =
            PollSchedule::new(self.timing.assert_timeout_ms, self.timing.poll_interval_ms);
        let mut driver_errors = Vec::new();

        for &classification in order {
            for text in expected.texts_for(classification) {
                match poll_visible(self.page, &StrategyKind::exact_text(text), schedule).await {
                    Probe::Visible(_) => {
                        tracing::debug!(%classification, text, "expected text visible");
                        return ClassificationResult {
                            classification,
                            matched_text: Some(text.to_string()),
                            note: None,
                        };
                    }
                    Probe::Failed(message) => driver_errors.push(message),
                    Probe::Hidden | Probe::Absent => {}
                }
            }
        }

        let checked: Vec<String> = expected
            .variants()
            .iter()
            .map(|v| format!("{:?}", v.text))
            .collect();
        let mut note = format!(
            "neither the expected nor the fallback text was visible (checked {})",
            checked.join(", ")
        );
        if !driver_errors.is_empty() {
            note.push_str(&format!("; driver errors: {}", driver_errors.join("; ")));
        }
        tracing::warn!(%note, "no expected text visible");
        ClassificationResult {
            classification: Classification::Unknown,
            matched_text: None,
            note: Some(note),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockPage};

    fn gallery() -> ExpectedText {
        ExpectedText::new()
            .correct("Subir de la galería")
            .fallback("Upload from gallery")
            .unknown("scanner.upload")
    }

    mod classify_tests {
        use super::*;

        #[tokio::test]
        async fn test_correct_text() {
            let page = MockPage::new()
                .with(MockElement::text("Subir de la galería"))
                .into_session();
            let result = Asserter::new(&page, Timing::instant())
                .assert_displayed(&gallery(), &Classification::DEFAULT_ORDER)
                .await;
            assert_eq!(result.classification, Classification::Correct);
            assert_eq!(result.matched_text.as_deref(), Some("Subir de la galería"));
        }

        #[tokio::test]
        async fn test_only_fallback_visible() {
            let page = MockPage::new()
                .with(MockElement::text("Upload from gallery"))
                .into_session();
            let result = Asserter::new(&page, Timing::instant())
                .assert_displayed(&gallery(), &Classification::DEFAULT_ORDER)
                .await;
            assert_eq!(result.classification, Classification::FallbackLanguage);
            assert_eq!(result.matched_text.as_deref(), Some("Upload from gallery"));
            assert!(result.note.is_none());
        }

        #[tokio::test]
        async fn test_total_miss() {
            let page = MockPage::new().with(MockElement::text("Cargando...")).into_session();
            let result = Asserter::new(&page, Timing::instant())
                .assert_displayed(&gallery(), &Classification::DEFAULT_ORDER)
                .await;
            assert_eq!(result.classification, Classification::Unknown);
            assert!(result.matched_text.is_none());
            assert!(result.note.unwrap().contains("Upload from gallery"));
        }

        #[tokio::test]
        async fn test_unknown_variant_matched() {
            let page = MockPage::new().with(MockElement::text("scanner.upload")).into_session();
            let result = Asserter::new(&page, Timing::instant())
                .assert_displayed(&gallery(), &Classification::DEFAULT_ORDER)
                .await;
            assert_eq!(result.classification, Classification::Unknown);
            assert!(result.matched());
        }

        #[tokio::test]
        async fn test_order_decides_when_both_visible() {
            let page = MockPage::new()
                .with(MockElement::text("Subir de la galería"))
                .with(MockElement::text("Upload from gallery"))
                .into_session();
            let order = [Classification::FallbackLanguage, Classification::Correct];
            let result = Asserter::new(&page, Timing::instant())
                .assert_displayed(&gallery(), &order)
                .await;
            assert_eq!(result.classification, Classification::FallbackLanguage);
        }

        #[tokio::test]
        async fn test_hidden_text_does_not_count() {
            let page = MockPage::new()
                .with(MockElement::text("Subir de la galería").hidden())
                .with(MockElement::text("Upload from gallery"))
                .into_session();
            let result = Asserter::new(&page, Timing::instant())
                .assert_displayed(&gallery(), &Classification::DEFAULT_ORDER)
                .await;
            assert_eq!(result.classification, Classification::FallbackLanguage);
        }

        #[tokio::test]
        async fn test_late_render_within_timeout() {
            let page = MockPage::new()
                .with(MockElement::text("Subir de la galería").appears_at(300))
                .into_session();
            let timing = Timing::instant().with_assert_timeout(500);
            let result = Asserter::new(&page, timing)
                .assert_displayed(&gallery(), &Classification::DEFAULT_ORDER)
                .await;
            assert_eq!(result.classification, Classification::Correct);
        }
    }

    mod table_tests {
        use super::*;

        #[test]
        fn test_validate_requires_correct() {
            assert!(ExpectedText::new().fallback("Upload").validate().is_err());
            assert!(gallery().validate().is_ok());
            assert!(ExpectedText::new().correct(" ").validate().is_err());
        }

        #[test]
        fn test_yaml_is_a_plain_list() {
            let yaml = "\
- classification: correct
  text: Subir de la galería
- classification: fallback_language
  text: Upload from gallery
";
            let parsed: ExpectedText = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(parsed.variants().len(), 2);
            assert_eq!(
                parsed.texts_for(Classification::FallbackLanguage).collect::<Vec<_>>(),
                vec!["Upload from gallery"]
            );
        }

        #[test]
        fn test_named_expectation() {
            let named =
                NamedExpectation::new("title", ExpectedText::new().correct("Escáner de Comidas"));
            assert_eq!(named.step_name(), "assert-title");
            assert!(named.validate().is_ok());
            assert!(NamedExpectation::new("bad name", gallery()).validate().is_err());
        }
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn test_fail_policy() {
            let p = FallbackPolicy::default();
            assert!(p.accepts(Classification::Correct));
            assert!(!p.accepts(Classification::FallbackLanguage));
            assert!(!p.accepts(Classification::Unknown));
        }

        #[test]
        fn test_warn_policy() {
            assert!(FallbackPolicy::Warn.accepts(Classification::FallbackLanguage));
            assert!(!FallbackPolicy::Warn.accepts(Classification::Unknown));
        }
    }
}
