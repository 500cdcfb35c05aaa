//! Result and error types for Verificar.

use crate::strategy::StrategyAttempt;
use thiserror::Error;

/// Result type for Verificar operations
pub type VerificarResult<T> = Result<T, VerificarError>;

/// Errors that can occur in Verificar
#[derive(Debug, Error)]
pub enum VerificarError {
    /// No strategy located (and, if required, activated) the target
    #[error("No strategy matched after {} attempt(s){}", .attempts.len(), format_trail(.attempts))]
    NotFound {
        /// Every attempted strategy with its failure reason
        attempts: Vec<StrategyAttempt>,
    },

    /// Element was found but a normal click was intercepted
    #[error("Click on {element} was intercepted: {message}")]
    ActionBlocked {
        /// Element identifier
        element: String,
        /// What intercepted the click
        message: String,
    },

    /// The target locale was never reached
    #[error("Could not switch to locale '{locale}'{}", format_trail(.trail))]
    LocaleSwitchFailed {
        /// Locale code that was requested
        locale: String,
        /// Attempted strategy trail
        trail: Vec<StrategyAttempt>,
    },

    /// The navigation target was unreachable
    #[error("Could not reach '{target}'{}", format_trail(.trail))]
    NavigationFailed {
        /// Logical feature identifier
        target: String,
        /// Attempted strategy trail
        trail: Vec<StrategyAttempt>,
    },

    /// Neither expected nor fallback text was visible
    #[error("Assertion inconclusive: {note}")]
    AssertionUnknown {
        /// Human-readable explanation
        note: String,
    },

    /// Artifact collection failed
    #[error("Diagnostics capture failed: {message}")]
    DiagnosticsCapture {
        /// Error message
        message: String,
    },

    /// A locator strategy violates its data invariant
    #[error("Invalid strategy: {message}")]
    InvalidStrategy {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Driver-level failure (launch, navigation, evaluation)
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl VerificarError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid strategy error
    #[must_use]
    pub fn invalid_strategy(message: impl Into<String>) -> Self {
        Self::InvalidStrategy {
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used in reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ActionBlocked { .. } => "action_blocked",
            Self::LocaleSwitchFailed { .. } => "locale_switch_failed",
            Self::NavigationFailed { .. } => "navigation_failed",
            Self::AssertionUnknown { .. } => "assertion_unknown",
            Self::DiagnosticsCapture { .. } => "diagnostics_capture",
            Self::InvalidStrategy { .. } => "invalid_strategy",
            Self::Config { .. } => "config",
            Self::Driver { .. } => "driver",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
        }
    }

    /// Attempted strategy trail carried by this error, if any
    #[must_use]
    pub fn trail(&self) -> &[StrategyAttempt] {
        match self {
            Self::NotFound { attempts } => attempts,
            Self::LocaleSwitchFailed { trail, .. } | Self::NavigationFailed { trail, .. } => trail,
            _ => &[],
        }
    }

    /// Whether this is an overlay interception
    #[must_use]
    pub const fn is_action_blocked(&self) -> bool {
        matches!(self, Self::ActionBlocked { .. })
    }
}

fn format_trail(trail: &[StrategyAttempt]) -> String {
    if trail.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = trail.iter().map(ToString::to_string).collect();
    format!(" [{}]", parts.join("; "))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::strategy::AttemptFailure;

    #[test]
    fn test_not_found_lists_attempts() {
        let err = VerificarError::NotFound {
            attempts: vec![
                StrategyAttempt::new("exact-text \"Scan Meal\"", AttemptFailure::NotLocated, 10),
                StrategyAttempt::new("aria-label \"Scan\"", AttemptFailure::NotVisible, 20),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 attempt(s)"));
        assert!(msg.contains("Scan Meal"));
        assert_eq!(err.trail().len(), 2);
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_locale_switch_failed_message() {
        let err = VerificarError::LocaleSwitchFailed {
            locale: "es".to_string(),
            trail: vec![],
        };
        assert_eq!(err.to_string(), "Could not switch to locale 'es'");
        assert!(err.trail().is_empty());
    }

    #[test]
    fn test_action_blocked_detection() {
        let err = VerificarError::ActionBlocked {
            element: "btn-1".to_string(),
            message: "overlay".to_string(),
        };
        assert!(err.is_action_blocked());
        assert!(!VerificarError::driver("boom").is_action_blocked());
    }

    #[test]
    fn test_constructors() {
        assert!(VerificarError::config("x").to_string().contains("Configuration"));
        assert!(VerificarError::invalid_strategy("empty")
            .to_string()
            .contains("Invalid strategy"));
        assert_eq!(VerificarError::driver("x").kind(), "driver");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: VerificarError = io.into();
        assert_eq!(err.kind(), "io");
    }
}
