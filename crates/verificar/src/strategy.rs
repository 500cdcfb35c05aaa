//! Locator strategies: declarative descriptions of how to find an element.
//!
//! A strategy never holds a live handle. It is configuration that the
//! [`StrategyResolver`](crate::StrategyResolver) turns into driver calls,
//! so "try A, else B, else C" is an ordered `Vec<LocatorStrategy>` rather
//! than nested control flow.
//!
//! ```text
//! exact-text "Escanear Comida"                     (1) localized label
//! exact-text "Scan Meal"                           (2) fallback-language label
//! aria-label "Scan Meal"                           (3) accessible name
//! aria-label "Quick Actions" > aria-label "Scan"   (4) opener + entry
//! nth(2) of "bottom-nav"                           (5) positional, last resort
//! ```

use crate::result::{VerificarError, VerificarResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default per-strategy timeout (2 seconds)
pub const DEFAULT_STRATEGY_TIMEOUT_MS: u64 = 2000;

fn default_timeout_ms() -> u64 {
    DEFAULT_STRATEGY_TIMEOUT_MS
}

/// What the resolver must do with a located element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Only locate a visible element
    Locate,
    /// Locate, then click (one forced retry on overlay interception)
    #[default]
    Click,
    /// Locate, then click with actionability checks disabled
    ClickForced,
}

impl Action {
    /// Whether the action requires interaction
    #[must_use]
    pub const fn interacts(self) -> bool {
        !matches!(self, Self::Locate)
    }
}

/// How an element is found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Element whose full text equals the value
    ExactText(String),
    /// Element whose text contains the value (case-insensitive)
    PartialText(String),
    /// Element with the given ARIA role and accessible name
    Role {
        /// ARIA role, e.g. `button`
        role: String,
        /// Accessible name
        name: String,
    },
    /// Element whose `aria-label` equals the value
    AriaLabel(String),
    /// The Nth element of a named collection (0-based)
    Positional {
        /// Collection name, e.g. `bottom-nav`
        region: String,
        /// Index within the collection
        index: usize,
    },
}

/// Stable name of a strategy kind, used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKindName {
    /// See [`StrategyKind::ExactText`]
    ExactText,
    /// See [`StrategyKind::PartialText`]
    PartialText,
    /// See [`StrategyKind::Role`]
    Role,
    /// See [`StrategyKind::AriaLabel`]
    AriaLabel,
    /// See [`StrategyKind::Positional`]
    Positional,
}

impl StrategyKind {
    /// Exact text strategy
    #[must_use]
    pub fn exact_text(text: impl Into<String>) -> Self {
        Self::ExactText(text.into())
    }

    /// Partial text strategy
    #[must_use]
    pub fn partial_text(text: impl Into<String>) -> Self {
        Self::PartialText(text.into())
    }

    /// Role + accessible name strategy
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    /// Aria label strategy
    #[must_use]
    pub fn aria_label(label: impl Into<String>) -> Self {
        Self::AriaLabel(label.into())
    }

    /// Positional strategy
    #[must_use]
    pub fn positional(region: impl Into<String>, index: usize) -> Self {
        Self::Positional {
            region: region.into(),
            index,
        }
    }

    /// Kind name without payload
    #[must_use]
    pub const fn name(&self) -> StrategyKindName {
        match self {
            Self::ExactText(_) => StrategyKindName::ExactText,
            Self::PartialText(_) => StrategyKindName::PartialText,
            Self::Role { .. } => StrategyKindName::Role,
            Self::AriaLabel(_) => StrategyKindName::AriaLabel,
            Self::Positional { .. } => StrategyKindName::Positional,
        }
    }

    /// Check the non-empty value invariant
    pub fn validate(&self) -> VerificarResult<()> {
        let empty = match self {
            Self::ExactText(v) | Self::PartialText(v) | Self::AriaLabel(v) => v.trim().is_empty(),
            Self::Role { role, name } => role.trim().is_empty() || name.trim().is_empty(),
            Self::Positional { region, .. } => region.trim().is_empty(),
        };
        if empty {
            return Err(VerificarError::invalid_strategy(format!(
                "{} requires a non-empty value",
                self.name()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for StrategyKindName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExactText => "exact-text",
            Self::PartialText => "partial-text",
            Self::Role => "role",
            Self::AriaLabel => "aria-label",
            Self::Positional => "positional",
        };
        f.write_str(name)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactText(v) | Self::PartialText(v) | Self::AriaLabel(v) => {
                write!(f, "{} {v:?}", self.name())
            }
            Self::Role { role, name } => write!(f, "role {role}[name={name:?}]"),
            Self::Positional { region, index } => write!(f, "nth({index}) of {region:?}"),
        }
    }
}

/// A single way to find (and optionally activate) an element.
///
/// `opener` is clicked first when present. It reveals this element, as a
/// floating action button reveals its menu entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    /// How to find the element
    #[serde(flatten)]
    pub kind: StrategyKind,
    /// How long to poll for the element
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Control that must be clicked before this element is reachable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opener: Option<Box<LocatorStrategy>>,
}

impl LocatorStrategy {
    /// Create a strategy with the default timeout
    #[must_use]
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            timeout_ms: DEFAULT_STRATEGY_TIMEOUT_MS,
            opener: None,
        }
    }

    /// Shorthand for an exact-text strategy
    #[must_use]
    pub fn exact_text(text: impl Into<String>) -> Self {
        Self::new(StrategyKind::exact_text(text))
    }

    /// Shorthand for a partial-text strategy
    #[must_use]
    pub fn partial_text(text: impl Into<String>) -> Self {
        Self::new(StrategyKind::partial_text(text))
    }

    /// Shorthand for a role + name strategy
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(StrategyKind::role(role, name))
    }

    /// Shorthand for an aria-label strategy
    #[must_use]
    pub fn aria_label(label: impl Into<String>) -> Self {
        Self::new(StrategyKind::aria_label(label))
    }

    /// Shorthand for a positional strategy
    #[must_use]
    pub fn positional(region: impl Into<String>, index: usize) -> Self {
        Self::new(StrategyKind::positional(region, index))
    }

    /// Set the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Require `opener` to be clicked first
    #[must_use]
    pub fn via(mut self, opener: LocatorStrategy) -> Self {
        self.opener = Some(Box::new(opener));
        self
    }

    /// Validate this strategy and its opener chain
    pub fn validate(&self) -> VerificarResult<()> {
        self.kind.validate()?;
        if let Some(opener) = &self.opener {
            opener.validate()?;
        }
        Ok(())
    }

    /// Worst-case time spent on this strategy, opener chain included
    #[must_use]
    pub fn budget_ms(&self) -> u64 {
        self.timeout_ms + self.opener.as_ref().map_or(0, |o| o.budget_ms())
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(opener) = &self.opener {
            write!(f, "{opener} > ")?;
        }
        write!(f, "{}", self.kind)
    }
}

/// Validate a non-empty strategy list
pub fn validate_list(what: &str, strategies: &[LocatorStrategy]) -> VerificarResult<()> {
    if strategies.is_empty() {
        return Err(VerificarError::config(format!(
            "{what} needs at least one strategy"
        )));
    }
    for strategy in strategies {
        strategy
            .validate()
            .map_err(|e| VerificarError::config(format!("{what}: {e}")))?;
    }
    Ok(())
}

/// Why a single strategy attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum AttemptFailure {
    /// Nothing matched within the timeout
    NotLocated,
    /// A match exists but never became visible
    NotVisible,
    /// Normal click intercepted and forced retry failed too
    Blocked(String),
    /// Click failed for another reason
    ClickFailed(String),
    /// The opener chain could not be activated
    OpenerFailed(String),
    /// The driver reported an error while locating
    Driver(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLocated => f.write_str("not located"),
            Self::NotVisible => f.write_str("located but not visible"),
            Self::Blocked(m) => write!(f, "click blocked even when forced: {m}"),
            Self::ClickFailed(m) => write!(f, "click failed: {m}"),
            Self::OpenerFailed(m) => write!(f, "opener failed: {m}"),
            Self::Driver(m) => write!(f, "driver error: {m}"),
        }
    }
}

/// One entry of the attempted-strategy trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    /// Human-readable strategy label
    pub strategy: String,
    /// Why it failed
    pub failure: AttemptFailure,
    /// Time spent on this attempt
    pub elapsed_ms: u64,
}

impl StrategyAttempt {
    /// Create a trail entry
    #[must_use]
    pub fn new(strategy: impl Into<String>, failure: AttemptFailure, elapsed_ms: u64) -> Self {
        Self {
            strategy: strategy.into(),
            failure,
            elapsed_ms,
        }
    }
}

impl fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.failure)
    }
}

/// The strategy that won, as recorded in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyUsed {
    /// 1-based position in the strategy list
    pub position: usize,
    /// Kind of the winning strategy
    pub kind: StrategyKindName,
    /// Human-readable label
    pub label: String,
    /// Whether the winning click had to be forced
    pub forced: bool,
}

impl fmt::Display for StrategyUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.position, self.label)?;
        if self.forced {
            f.write_str(" (forced)")?;
        }
        Ok(())
    }
}
