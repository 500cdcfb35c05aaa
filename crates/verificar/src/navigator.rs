//! Reaching a logical feature through whatever affordance exists.

use crate::driver::PageDriver;
use crate::resolver::{Resolution, StrategyResolver};
use crate::result::{VerificarError, VerificarResult};
use crate::strategy::{validate_list, Action, LocatorStrategy};
use crate::wait::Timing;
use serde::{Deserialize, Serialize};

/// A named feature and the ordered ways to reach it.
///
/// Strategies run from most to least specific: localized label, fallback
/// label, accessible name, menu + entry, then positional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationTarget {
    /// Logical feature identifier, e.g. `meal-scanner`
    pub name: String,
    /// Ways to reach it, most specific first
    pub strategies: Vec<LocatorStrategy>,
    /// Click mode applied to the winning element
    #[serde(default)]
    pub click: Action,
}

impl NavigationTarget {
    /// Create a target with no strategies yet
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategies: Vec::new(),
            click: Action::Click,
        }
    }

    /// Append a strategy
    #[must_use]
    pub fn then(mut self, strategy: LocatorStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Skip normal clicks and always force
    #[must_use]
    pub const fn forced(mut self) -> Self {
        self.click = Action::ClickForced;
        self
    }

    /// Check the target's invariants
    ///
    /// # Errors
    ///
    /// Returns a config error if the name is blank, the list is empty or a
    /// strategy is invalid.
    pub fn validate(&self) -> VerificarResult<()> {
        if self.name.trim().is_empty() {
            return Err(VerificarError::config("navigation target has no name"));
        }
        if self.click == Action::Locate {
            return Err(VerificarError::config(format!(
                "navigation target '{}' must click, not only locate",
                self.name
            )));
        }
        validate_list(&format!("navigation target '{}'", self.name), &self.strategies)
    }
}

/// Drives the page to a [`NavigationTarget`]
pub struct Navigator<'a> {
    page: &'a dyn PageDriver,
    timing: Timing,
}

impl std::fmt::Debug for Navigator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl<'a> Navigator<'a> {
    /// Create a navigator over `page`
    #[must_use]
    pub const fn new(page: &'a dyn PageDriver, timing: Timing) -> Self {
        Self { page, timing }
    }

    /// Click through to `target`, then let the new view settle.
    ///
    /// # Errors
    ///
    /// [`VerificarError::NavigationFailed`] with the attempt trail when
    /// every strategy fails.
    pub async fn navigate_to(&self, target: &NavigationTarget) -> VerificarResult<Resolution> {
        let resolver = StrategyResolver::new(self.page, self.timing);
        match resolver.resolve(&target.strategies, target.click).await {
            Ok(resolution) => {
                tracing::info!(
                    target = %target.name,
                    strategy = %resolution.strategy_used,
                    "navigated"
                );
                self.page.wait(self.timing.settle_ms).await;
                Ok(resolution)
            }
            Err(e) => Err(VerificarError::NavigationFailed {
                target: target.name.clone(),
                trail: e.trail().to_vec(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockPage};
    use crate::strategy::StrategyKindName;

    fn meal_scanner() -> NavigationTarget {
        NavigationTarget::new("meal-scanner")
            .then(LocatorStrategy::exact_text("Escanear Comida").with_timeout(100))
            .then(LocatorStrategy::exact_text("Scan Meal").with_timeout(100))
            .then(LocatorStrategy::aria_label("Scan Meal").with_timeout(100))
            .then(
                LocatorStrategy::aria_label("Scan Meal")
                    .with_timeout(100)
                    .via(LocatorStrategy::aria_label("Quick Actions").with_timeout(100)),
            )
            .then(LocatorStrategy::positional("bottom-nav", 2).with_timeout(100))
    }

    mod navigate_tests {
        use super::*;

        #[tokio::test]
        async fn test_localized_label_first() {
            let page = MockPage::new()
                .with(MockElement::button("Escanear Comida"))
                .with(MockElement::button("Scan Meal"))
                .into_session();
            let nav = Navigator::new(&page, Timing::instant().with_settle(1000));
            let res = nav.navigate_to(&meal_scanner()).await.unwrap();
            assert_eq!(res.strategy_used.position, 1);
            assert_eq!(res.strategy_used.kind, StrategyKindName::ExactText);
            assert_eq!(page.waited_ms(), 1000);
        }

        #[tokio::test]
        async fn test_fallback_language_label() {
            let page = MockPage::new().with(MockElement::button("Scan Meal")).into_session();
            let nav = Navigator::new(&page, Timing::instant());
            let res = nav.navigate_to(&meal_scanner()).await.unwrap();
            assert_eq!(res.strategy_used.position, 2);
        }

        #[tokio::test]
        async fn test_fab_menu_path() {
            let page = MockPage::new()
                .with(MockElement::icon_button("Quick Actions").reveals("fab-scan"))
                .with(MockElement::icon_button("Scan Meal").id("fab-scan").hidden())
                .into_session();
            let nav = Navigator::new(&page, Timing::instant());
            let res = nav.navigate_to(&meal_scanner()).await.unwrap();
            assert_eq!(res.strategy_used.position, 4);
            assert_eq!(res.element.id, "fab-scan");
        }

        #[tokio::test]
        async fn test_positional_last_resort() {
            let page = MockPage::new()
                .with(MockElement::button("Inicio").in_region("bottom-nav"))
                .with(MockElement::button("Registros").in_region("bottom-nav"))
                .with(MockElement::button("Cámara").in_region("bottom-nav"))
                .into_session();
            let nav = Navigator::new(&page, Timing::instant());
            let res = nav.navigate_to(&meal_scanner()).await.unwrap();
            assert_eq!(res.strategy_used.position, 5);
            assert_eq!(res.trail.len(), 4);
            assert_eq!(res.element.id, "Cámara");
        }

        #[tokio::test]
        async fn test_unreachable_target() {
            let page = MockPage::new().into_session();
            let nav = Navigator::new(&page, Timing::instant().with_settle(1000));
            let err = nav.navigate_to(&meal_scanner()).await.unwrap_err();
            assert_eq!(err.kind(), "navigation_failed");
            assert_eq!(err.trail().len(), 5);
            assert!(err.to_string().contains("meal-scanner"));
        }

        #[tokio::test]
        async fn test_forced_target() {
            let page = MockPage::new()
                .with(MockElement::button("Escanear Comida"))
                .into_session();
            let nav = Navigator::new(&page, Timing::instant());
            let res = nav.navigate_to(&meal_scanner().forced()).await.unwrap();
            assert!(res.strategy_used.forced);
            assert!(!page.was_called("click:"));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_empty_strategies_rejected() {
            assert!(NavigationTarget::new("meal-scanner").validate().is_err());
        }

        #[test]
        fn test_locate_only_rejected() {
            let mut target = meal_scanner();
            target.click = Action::Locate;
            assert!(target.validate().is_err());
        }

        #[test]
        fn test_valid_target() {
            assert!(meal_scanner().validate().is_ok());
        }
    }
}
