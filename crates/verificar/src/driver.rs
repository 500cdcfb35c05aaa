//! Driver seam: the browser-automation capabilities the engine consumes.
//!
//! The engine never talks to a browser directly. Everything goes through
//! [`Driver`] (opens a browsing context) and [`PageDriver`] (the live page
//! handle for one run). This lets the same pipeline run against Chromium,
//! against the scripted [`MockDriver`](crate::mock::MockDriver), or against
//! any other automation backend.
//!
//! ```text
//! ┌──────────────┐  open_context  ┌──────────────────────────────────────┐
//! │ Orchestrator │───────────────►│ PageDriver (one per run)             │
//! └──────────────┘                │  goto · locate · click · is_visible  │
//!                                 │  wait · screenshot · list_interactive│
//!                                 └──────────────────────────────────────┘
//! ```

use crate::result::VerificarResult;
use crate::strategy::StrategyKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Opaque handle to a located element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identifier
    pub id: String,
    /// ARIA role, if known
    pub role: Option<String>,
    /// Accessible name or text, if known
    pub name: Option<String>,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: None,
            name: None,
        }
    }

    /// Set the role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the accessible name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A visible interactive element, as dumped for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveElement {
    /// ARIA role (`button`, `link`, ...)
    pub role: String,
    /// Accessible name
    pub accessible_name: String,
}

impl InteractiveElement {
    /// Create a new entry
    #[must_use]
    pub fn new(role: impl Into<String>, accessible_name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            accessible_name: accessible_name.into(),
        }
    }
}

/// Browsing-context configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Emulate a mobile device (touch, mobile UA metrics)
    pub mobile: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Named UI regions mapped to CSS selectors, for positional strategies
    pub regions: BTreeMap<String, String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            mobile: false,
            chromium_path: None,
            sandbox: true,
            regions: BTreeMap::new(),
        }
    }
}

impl DriverConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Phone-sized viewport used by the mobile verification flows
    #[must_use]
    pub fn mobile() -> Self {
        Self::default().with_viewport(375, 812).with_mobile(true)
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set mobile emulation
    #[must_use]
    pub const fn with_mobile(mut self, mobile: bool) -> Self {
        self.mobile = mobile;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Register a named region
    #[must_use]
    pub fn with_region(mut self, name: impl Into<String>, selector: impl Into<String>) -> Self {
        self.regions.insert(name.into(), selector.into());
        self
    }

    /// CSS selector for a region name; unknown names are used as selectors
    #[must_use]
    pub fn region_selector<'a>(&'a self, region: &'a str) -> &'a str {
        self.regions.get(region).map_or(region, String::as_str)
    }
}

/// Opens independent browsing contexts.
///
/// Each verification run owns one context; concurrent runs open their own.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Page handle type
    type Page: PageDriver;

    /// Open a fresh browsing context with one page
    async fn open_context(&self, config: &DriverConfig) -> VerificarResult<Self::Page>;
}

/// A live page inside one browsing context.
///
/// All methods take `&self`. A run is strictly sequential, and the handle
/// is only touched by the component currently holding the step.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to URL
    async fn goto(&self, url: &str) -> VerificarResult<()>;

    /// Find the first element matching `kind`, if any (no waiting)
    async fn locate(&self, kind: &StrategyKind) -> VerificarResult<Option<ElementHandle>>;

    /// Click an element.
    ///
    /// With `forced == false` an overlay intercepting the click must be
    /// reported as [`VerificarError::ActionBlocked`](crate::VerificarError::ActionBlocked).
    async fn click(&self, element: &ElementHandle, forced: bool) -> VerificarResult<()>;

    /// Whether the element is currently rendered and visible
    async fn is_visible(&self, element: &ElementHandle) -> VerificarResult<bool>;

    /// Suspend for `ms` milliseconds
    async fn wait(&self, ms: u64);

    /// Write a PNG screenshot to `path`
    async fn screenshot(&self, path: &Path) -> VerificarResult<()>;

    /// Visible interactive elements with their accessible names
    async fn list_interactive_elements(&self) -> VerificarResult<Vec<InteractiveElement>>;

    /// Release the browsing context
    async fn close(&self) -> VerificarResult<()> {
        Ok(())
    }
}
