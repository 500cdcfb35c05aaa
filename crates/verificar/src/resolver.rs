//! Ordered-strategy resolution.
//!
//! [`StrategyResolver::resolve`] walks a strategy list in order and returns
//! the first strategy that locates a visible element and, when the action
//! requires it, clicks it. A normal click intercepted by an overlay gets
//! exactly one forced retry. Failures are absorbed into the attempt trail;
//! only exhausting the list is an error.

use crate::driver::{ElementHandle, PageDriver};
use crate::result::{VerificarError, VerificarResult};
use crate::strategy::{Action, AttemptFailure, LocatorStrategy, StrategyAttempt, StrategyUsed};
use crate::wait::{poll_visible, PollSchedule, Probe, Timing};
use futures::future::{BoxFuture, FutureExt};
use std::time::Instant;

/// A winning strategy with the element it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Which strategy won
    pub strategy_used: StrategyUsed,
    /// The located (and possibly clicked) element
    pub element: ElementHandle,
    /// Strategies that failed before the winner
    pub trail: Vec<StrategyAttempt>,
}

/// Tries ordered strategies against a live page
pub struct StrategyResolver<'a> {
    page: &'a dyn PageDriver,
    timing: Timing,
}

impl std::fmt::Debug for StrategyResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyResolver")
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

struct Hit {
    element: ElementHandle,
    forced: bool,
}

impl<'a> StrategyResolver<'a> {
    /// Create a resolver over `page`
    #[must_use]
    pub const fn new(page: &'a dyn PageDriver, timing: Timing) -> Self {
        Self { page, timing }
    }

    /// Resolve `strategies` in order, stopping at the first success.
    ///
    /// # Errors
    ///
    /// [`VerificarError::NotFound`] with every attempt when all strategies fail.
    pub async fn resolve(
        &self,
        strategies: &[LocatorStrategy],
        action: Action,
    ) -> VerificarResult<Resolution> {
        let mut trail = Vec::with_capacity(strategies.len());

        for (i, strategy) in strategies.iter().enumerate() {
            let label = strategy.to_string();
            let start = Instant::now();
            match self.attempt(strategy, action).await {
                Ok(hit) => {
                    tracing::debug!(
                        position = i + 1,
                        strategy = %label,
                        forced = hit.forced,
                        "strategy resolved"
                    );
                    return Ok(Resolution {
                        strategy_used: StrategyUsed {
                            position: i + 1,
                            kind: strategy.kind.name(),
                            label,
                            forced: hit.forced,
                        },
                        element: hit.element,
                        trail,
                    });
                }
                Err(failure) => {
                    tracing::debug!(
                        position = i + 1,
                        strategy = %label,
                        %failure,
                        "strategy failed"
                    );
                    trail.push(StrategyAttempt::new(label, failure, elapsed_ms(start)));
                }
            }
        }

        tracing::warn!(attempts = trail.len(), "all strategies exhausted");
        Err(VerificarError::NotFound { attempts: trail })
    }

    fn attempt<'s>(
        &'s self,
        strategy: &'s LocatorStrategy,
        action: Action,
    ) -> BoxFuture<'s, Result<Hit, AttemptFailure>> {
        async move {
            if let Some(opener) = &strategy.opener {
                self.attempt(opener, Action::Click)
                    .await
                    .map_err(|f| AttemptFailure::OpenerFailed(format!("{opener}: {f}")))?;
                self.page.wait(self.timing.menu_settle_ms).await;
            }

            let schedule = PollSchedule::new(strategy.timeout_ms, self.timing.poll_interval_ms);
            let element = match poll_visible(self.page, &strategy.kind, schedule).await {
                Probe::Visible(element) => element,
                Probe::Hidden => return Err(AttemptFailure::NotVisible),
                Probe::Absent => return Err(AttemptFailure::NotLocated),
                Probe::Failed(message) => return Err(AttemptFailure::Driver(message)),
            };

            match action {
                Action::Locate => Ok(Hit { element, forced: false }),
                Action::ClickForced => match self.page.click(&element, true).await {
                    Ok(()) => Ok(Hit { element, forced: true }),
                    Err(e) => Err(AttemptFailure::ClickFailed(e.to_string())),
                },
                Action::Click => match self.page.click(&element, false).await {
                    Ok(()) => Ok(Hit { element, forced: false }),
                    Err(e) if e.is_action_blocked() => {
                        tracing::debug!(element = %element.id, "click intercepted, forcing");
                        match self.page.click(&element, true).await {
                            Ok(()) => Ok(Hit { element, forced: true }),
                            Err(e) => Err(AttemptFailure::Blocked(e.to_string())),
                        }
                    }
                    Err(e) => Err(AttemptFailure::ClickFailed(e.to_string())),
                },
            }
        }
        .boxed()
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockPage};
    use crate::strategy::{StrategyKind, StrategyKindName};

    fn quick(s: LocatorStrategy) -> LocatorStrategy {
        s.with_timeout(100)
    }

    mod order_tests {
        use super::*;

        #[tokio::test]
        async fn test_third_strategy_wins_and_fourth_never_tried() {
            let page = MockPage::new()
                .with(MockElement::icon_button("Scan Meal"))
                .with(MockElement::button("Logs").in_region("bottom-nav"))
                .into_session();
            let strategies = vec![
                quick(LocatorStrategy::exact_text("Escanear Comida")),
                quick(LocatorStrategy::exact_text("Scan Meal")),
                quick(LocatorStrategy::aria_label("Scan Meal")),
                quick(LocatorStrategy::positional("bottom-nav", 0)),
            ];
            let resolver = StrategyResolver::new(&page, Timing::instant());
            let res = resolver.resolve(&strategies, Action::Click).await.unwrap();

            assert_eq!(res.strategy_used.position, 3);
            assert_eq!(res.strategy_used.kind, StrategyKindName::AriaLabel);
            assert_eq!(res.trail.len(), 2);
            assert!(res.trail.iter().all(|a| a.failure == AttemptFailure::NotLocated));
            let fourth = format!("locate:{}", StrategyKind::positional("bottom-nav", 0));
            assert!(!page.was_called(&fourth));
        }

        #[tokio::test]
        async fn test_first_strategy_wins_without_trail() {
            let page = MockPage::new()
                .with(MockElement::button("Escanear Comida"))
                .into_session();
            let resolver = StrategyResolver::new(&page, Timing::instant());
            let res = resolver
                .resolve(&[LocatorStrategy::exact_text("Escanear Comida")], Action::Click)
                .await
                .unwrap();
            assert_eq!(res.strategy_used.position, 1);
            assert!(res.trail.is_empty());
            assert!(!res.strategy_used.forced);
        }

        #[tokio::test]
        async fn test_exhaustion_reports_every_attempt() {
            let page = MockPage::new()
                .with(MockElement::button("Scan Meal").hidden())
                .into_session();
            let strategies = vec![
                quick(LocatorStrategy::exact_text("Escanear Comida")),
                quick(LocatorStrategy::exact_text("Scan Meal")),
            ];
            let resolver = StrategyResolver::new(&page, Timing::instant());
            let err = resolver.resolve(&strategies, Action::Click).await.unwrap_err();
            let trail = err.trail();
            assert_eq!(err.kind(), "not_found");
            assert_eq!(trail.len(), 2);
            assert_eq!(trail[0].failure, AttemptFailure::NotLocated);
            assert_eq!(trail[1].failure, AttemptFailure::NotVisible);
        }

        #[tokio::test]
        async fn test_positional_reached_only_after_textual_fail() {
            let page = MockPage::new()
                .with(MockElement::button("Home").in_region("bottom-nav"))
                .with(MockElement::button("Escáner").in_region("bottom-nav"))
                .into_session();
            let strategies = vec![
                quick(LocatorStrategy::exact_text("Escanear Comida")),
                quick(LocatorStrategy::aria_label("Scan Meal")),
                quick(LocatorStrategy::positional("bottom-nav", 1)),
            ];
            let resolver = StrategyResolver::new(&page, Timing::instant());
            let res = resolver.resolve(&strategies, Action::Click).await.unwrap();
            assert_eq!(res.strategy_used.kind, StrategyKindName::Positional);
            assert_eq!(res.element.id, "Escáner");
            assert_eq!(res.trail.len(), 2);
        }
    }

    mod click_tests {
        use super::*;

        #[tokio::test]
        async fn test_intercepted_click_forced_once() {
            let page = MockPage::new()
                .with(MockElement::button("Escanear Comida").intercepted())
                .into_session();
            let resolver = StrategyResolver::new(&page, Timing::instant());
            let res = resolver
                .resolve(&[LocatorStrategy::exact_text("Escanear Comida")], Action::Click)
                .await
                .unwrap();
            assert!(res.strategy_used.forced);
            assert!(res.trail.is_empty());
            assert_eq!(page.click_count("Escanear Comida"), 2);
        }

        #[tokio::test]
        async fn test_blocked_element_does_not_stop_chain() {
            let page = MockPage::new()
                .with(MockElement::button("Escanear Comida").always_blocked())
                .with(MockElement::icon_button("Scan Meal"))
                .into_session();
            let strategies = vec![
                quick(LocatorStrategy::exact_text("Escanear Comida")),
                quick(LocatorStrategy::aria_label("Scan Meal")),
            ];
            let resolver = StrategyResolver::new(&page, Timing::instant());
            let res = resolver.resolve(&strategies, Action::Click).await.unwrap();
            assert_eq!(res.strategy_used.position, 2);
            assert!(matches!(res.trail[0].failure, AttemptFailure::Blocked(_)));
            assert_eq!(page.click_count("Escanear Comida"), 2);
        }

        #[tokio::test]
        async fn test_detached_click_not_retried() {
            let page = MockPage::new()
                .with(MockElement::button("Scan").detached())
                .into_session();
            let resolver = StrategyResolver::new(&page, Timing::instant());
            let err = resolver
                .resolve(&[quick(LocatorStrategy::exact_text("Scan"))], Action::Click)
                .await
                .unwrap_err();
            assert!(matches!(err.trail()[0].failure, AttemptFailure::ClickFailed(_)));
            assert_eq!(page.click_count("Scan"), 1);
        }

        #[tokio::test]
        async fn test_click_forced_skips_normal_click() {
            let page = MockPage::new()
                .with(MockElement::button("Scan").intercepted())
                .into_session();
            let resolver = StrategyResolver::new(&page, Timing::instant());
            let res = resolver
                .resolve(&[LocatorStrategy::exact_text("Scan")], Action::ClickForced)
                .await
                .unwrap();
            assert!(res.strategy_used.forced);
            assert!(!page.was_called("click:Scan"));
            assert!(page.was_called("click-forced:Scan"));
        }

        #[tokio::test]
        async fn test_locate_never_clicks() {
            let page = MockPage::new().with(MockElement::button("EN")).into_session();
            let resolver = StrategyResolver::new(&page, Timing::instant());
            resolver
                .resolve(&[LocatorStrategy::exact_text("EN")], Action::Locate)
                .await
                .unwrap();
            assert_eq!(page.click_count("EN"), 0);
        }
    }

    mod opener_tests {
        use super::*;

        #[tokio::test]
        async fn test_opener_reveals_entry() {
            let page = MockPage::new()
                .with(MockElement::icon_button("Quick Actions").reveals("entry"))
                .with(MockElement::icon_button("Scan Meal").id("entry").hidden())
                .into_session();
            let strategy = quick(LocatorStrategy::aria_label("Scan Meal"))
                .via(quick(LocatorStrategy::aria_label("Quick Actions")));
            let resolver = StrategyResolver::new(&page, Timing::instant().with_menu_settle(500));
            let res = resolver.resolve(&[strategy], Action::Click).await.unwrap();
            assert_eq!(res.element.id, "entry");
            assert_eq!(
                res.strategy_used.label,
                "aria-label \"Quick Actions\" > aria-label \"Scan Meal\""
            );
            assert!(page.waited_ms() >= 500);
        }

        #[tokio::test]
        async fn test_missing_opener_recorded() {
            let page = MockPage::new().into_session();
            let strategy = quick(LocatorStrategy::aria_label("Scan Meal"))
                .via(quick(LocatorStrategy::aria_label("Quick Actions")));
            let resolver = StrategyResolver::new(&page, Timing::instant());
            let err = resolver.resolve(&[strategy], Action::Click).await.unwrap_err();
            match &err.trail()[0].failure {
                AttemptFailure::OpenerFailed(msg) => assert!(msg.contains("Quick Actions")),
                other => panic!("unexpected failure: {other:?}"),
            }
        }
    }
}
