//! Scripted in-memory page for exercising the pipeline without a browser.
//!
//! A [`MockPage`] is a flat list of [`MockElement`]s. Each element has a
//! visibility flag, an optional appearance time on the virtual clock, a
//! click behavior (normal, overlay-intercepted, ...) and click effects that
//! show or hide other elements. That is enough to script every flow the
//! engine has to survive: locale toggles that open menus, FABs that reveal
//! entries, overlays that swallow clicks, content that renders late.
//!
//! Waits advance a virtual clock instead of sleeping.

use crate::config::RunConfig;
use crate::driver::{Driver, DriverConfig, ElementHandle, InteractiveElement, PageDriver};
use crate::result::{VerificarError, VerificarResult};
use crate::strategy::{LocatorStrategy, StrategyKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// PNG signature written by mock screenshots
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

const INTERACTIVE_ROLES: &[&str] = &["button", "link", "menuitem", "tab", "option", "checkbox"];

/// How an element reacts to clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClickBehavior {
    /// Clicks land
    #[default]
    Normal,
    /// An overlay intercepts normal clicks; forced clicks land
    Intercepted,
    /// Every click is intercepted, forced or not
    AlwaysBlocked,
    /// Clicks fail outright (element detached on click)
    Detached,
}

/// What a landed click does to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEffect {
    /// Make the element with this id visible
    Show(String),
    /// Hide the element with this id
    Hide(String),
}

/// One scripted element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Identifier; defaults to the accessible name
    pub id: String,
    /// ARIA role
    pub role: String,
    /// Text content
    pub text: String,
    /// `aria-label`
    pub aria_label: Option<String>,
    /// Named collection the element belongs to
    pub region: Option<String>,
    /// Whether the element is shown
    pub visible: bool,
    /// Virtual time before which the element is not rendered
    pub appears_at_ms: u64,
    /// Click reaction
    pub click: ClickBehavior,
    /// Effects of a landed click
    pub on_click: Vec<PageEffect>,
}

impl MockElement {
    fn with_role(role: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: text.clone(),
            role: role.to_string(),
            text,
            aria_label: None,
            region: None,
            visible: true,
            appears_at_ms: 0,
            click: ClickBehavior::Normal,
            on_click: Vec::new(),
        }
    }

    /// Static text
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_role("text", text)
    }

    /// Button with visible text
    #[must_use]
    pub fn button(text: impl Into<String>) -> Self {
        Self::with_role("button", text)
    }

    /// Link with visible text
    #[must_use]
    pub fn link(text: impl Into<String>) -> Self {
        Self::with_role("link", text)
    }

    /// Icon-only button identified by its `aria-label`
    #[must_use]
    pub fn icon_button(aria_label: impl Into<String>) -> Self {
        let label = aria_label.into();
        let mut el = Self::with_role("button", "");
        el.id.clone_from(&label);
        el.aria_label = Some(label);
        el
    }

    /// Override the id
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the `aria-label`
    #[must_use]
    pub fn aria(mut self, label: impl Into<String>) -> Self {
        self.aria_label = Some(label.into());
        self
    }

    /// Put the element in a named collection
    #[must_use]
    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Start hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Render only once the virtual clock reaches `ms`
    #[must_use]
    pub const fn appears_at(mut self, ms: u64) -> Self {
        self.appears_at_ms = ms;
        self
    }

    /// Normal clicks are intercepted by an overlay
    #[must_use]
    pub const fn intercepted(mut self) -> Self {
        self.click = ClickBehavior::Intercepted;
        self
    }

    /// All clicks are intercepted
    #[must_use]
    pub const fn always_blocked(mut self) -> Self {
        self.click = ClickBehavior::AlwaysBlocked;
        self
    }

    /// Clicks fail outright
    #[must_use]
    pub const fn detached(mut self) -> Self {
        self.click = ClickBehavior::Detached;
        self
    }

    /// Clicking shows the element with `id`
    #[must_use]
    pub fn reveals(mut self, id: impl Into<String>) -> Self {
        self.on_click.push(PageEffect::Show(id.into()));
        self
    }

    /// Clicking hides the element with `id`
    #[must_use]
    pub fn conceals(mut self, id: impl Into<String>) -> Self {
        self.on_click.push(PageEffect::Hide(id.into()));
        self
    }

    /// `aria-label` if set, else text
    #[must_use]
    pub fn accessible_name(&self) -> &str {
        self.aria_label.as_deref().unwrap_or(&self.text)
    }

    fn rendered(&self, clock_ms: u64) -> bool {
        self.visible && clock_ms >= self.appears_at_ms
    }

    fn is_interactive(&self) -> bool {
        INTERACTIVE_ROLES.contains(&self.role.as_str())
    }

    fn handle(&self) -> ElementHandle {
        ElementHandle::new(self.id.clone())
            .with_role(self.role.clone())
            .with_name(self.accessible_name().to_string())
    }
}

/// A scripted page
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    elements: Vec<MockElement>,
    fail_screenshots: bool,
    fail_element_dump: bool,
}

impl MockPage {
    /// Empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element
    #[must_use]
    pub fn with(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Add several elements
    #[must_use]
    pub fn with_all(mut self, elements: impl IntoIterator<Item = MockElement>) -> Self {
        self.elements.extend(elements);
        self
    }

    /// Screenshot calls fail
    #[must_use]
    pub const fn failing_screenshots(mut self) -> Self {
        self.fail_screenshots = true;
        self
    }

    /// Interactive-element dumps fail
    #[must_use]
    pub const fn failing_element_dump(mut self) -> Self {
        self.fail_element_dump = true;
        self
    }

    /// Scripted elements
    #[must_use]
    pub fn elements(&self) -> &[MockElement] {
        &self.elements
    }

    /// Live session over this page with its own call history
    #[must_use]
    pub fn into_session(self) -> MockSession {
        MockSession::new(self, Arc::new(Mutex::new(Vec::new())))
    }

    /// Page on which `config` passes: anchor visible, first navigation
    /// strategy reachable, every `correct` text revealed by navigating.
    #[must_use]
    pub fn happy_path(config: &RunConfig) -> Self {
        let anchor = MockElement::text(&config.target_locale.anchor_probe_text).id("anchor");
        let mut page = Self::new().with(anchor);

        let mut expected_ids = Vec::new();
        let corrects = config
            .expected_text
            .correct_texts()
            .chain(config.also_expect.iter().flat_map(|e| e.expected.correct_texts()));
        for (i, text) in corrects.enumerate() {
            let id = format!("expected-{i}");
            page = page.with(MockElement::text(text).id(id.clone()).hidden());
            expected_ids.push(id);
        }

        if let Some(first) = config.navigation_target.strategies.first() {
            page = page.with_all(elements_for(first, "nav", &expected_ids, true));
        }
        page
    }
}

/// Elements that satisfy `strategy`; the target reveals `reveals` on click.
fn elements_for(
    strategy: &LocatorStrategy,
    id: &str,
    reveals: &[String],
    visible: bool,
) -> Vec<MockElement> {
    let mut target = match &strategy.kind {
        StrategyKind::ExactText(t) | StrategyKind::PartialText(t) => MockElement::button(t.clone()),
        StrategyKind::Role { role, name } => MockElement::with_role(role, name.clone()),
        StrategyKind::AriaLabel(l) => MockElement::icon_button(l.clone()),
        StrategyKind::Positional { region, .. } => {
            MockElement::button(id).in_region(region.clone())
        }
    }
    .id(id);
    for r in reveals {
        target = target.reveals(r.clone());
    }

    let mut out = Vec::new();
    if let StrategyKind::Positional { region, index } = &strategy.kind {
        for n in 0..*index {
            out.push(MockElement::button(format!("{id}-filler-{n}")).in_region(region.clone()));
        }
    }

    match &strategy.opener {
        Some(opener) => {
            out.push(target.hidden());
            let opener_id = format!("{id}-opener");
            let mut chain = elements_for(opener, &opener_id, &[id.to_string()], visible);
            chain.extend(out);
            chain
        }
        None => {
            if !visible {
                target = target.hidden();
            }
            out.push(target);
            out
        }
    }
}

#[derive(Debug)]
struct SessionState {
    elements: Vec<MockElement>,
    clock_ms: u64,
    waited_ms: u64,
    url: String,
}

/// A live session on a [`MockPage`]
#[derive(Debug)]
pub struct MockSession {
    state: Mutex<SessionState>,
    calls: Arc<Mutex<Vec<String>>>,
    fail_screenshots: bool,
    fail_element_dump: bool,
}

impl MockSession {
    fn new(page: MockPage, calls: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            state: Mutex::new(SessionState {
                elements: page.elements,
                clock_ms: 0,
                waited_ms: 0,
                url: String::from("about:blank"),
            }),
            calls,
            fail_screenshots: page.fail_screenshots,
            fail_element_dump: page.fail_element_dump,
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    /// Call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls.lock().iter().any(|c| c.starts_with(prefix))
    }

    /// Number of landed or attempted clicks on `id` (normal and forced)
    #[must_use]
    pub fn click_count(&self, id: &str) -> usize {
        count_clicks(&self.calls.lock(), id)
    }

    /// Total virtual time spent waiting
    #[must_use]
    pub fn waited_ms(&self) -> u64 {
        self.state.lock().waited_ms
    }

    /// Current URL
    #[must_use]
    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    /// Whether the element with `id` is currently rendered
    #[must_use]
    pub fn is_shown(&self, id: &str) -> bool {
        let state = self.state.lock();
        state
            .elements
            .iter()
            .any(|e| e.id == id && e.rendered(state.clock_ms))
    }
}

fn count_clicks(calls: &[String], id: &str) -> usize {
    calls
        .iter()
        .filter(|c| {
            c.strip_prefix("click:")
                .or_else(|| c.strip_prefix("click-forced:"))
                .is_some_and(|target| target == id)
        })
        .count()
}

fn matches(element: &MockElement, kind: &StrategyKind) -> bool {
    match kind {
        StrategyKind::ExactText(t) => element.text.trim() == t.trim(),
        StrategyKind::PartialText(t) => element.text.to_lowercase().contains(&t.to_lowercase()),
        StrategyKind::Role { role, name } => {
            &element.role == role && element.accessible_name() == name
        }
        StrategyKind::AriaLabel(l) => element.aria_label.as_deref() == Some(l.as_str()),
        StrategyKind::Positional { .. } => false,
    }
}

#[async_trait]
impl PageDriver for MockSession {
    async fn goto(&self, url: &str) -> VerificarResult<()> {
        self.record(format!("goto:{url}"));
        self.state.lock().url = url.to_string();
        Ok(())
    }

    async fn locate(&self, kind: &StrategyKind) -> VerificarResult<Option<ElementHandle>> {
        self.record(format!("locate:{kind}"));
        let state = self.state.lock();
        let clock = state.clock_ms;

        if let StrategyKind::Positional { region, index } = kind {
            return Ok(state
                .elements
                .iter()
                .filter(|e| e.region.as_deref() == Some(region.as_str()) && e.rendered(clock))
                .nth(*index)
                .map(MockElement::handle));
        }

        let mut candidates = state.elements.iter().filter(|e| matches(e, kind));
        let first = candidates.next();
        let visible = first
            .filter(|e| e.rendered(clock))
            .or_else(|| candidates.find(|e| e.rendered(clock)));
        Ok(visible.or(first).map(MockElement::handle))
    }

    async fn click(&self, element: &ElementHandle, forced: bool) -> VerificarResult<()> {
        let verb = if forced { "click-forced" } else { "click" };
        self.record(format!("{verb}:{}", element.id));

        let mut state = self.state.lock();
        let target = state
            .elements
            .iter()
            .find(|e| e.id == element.id)
            .cloned()
            .ok_or_else(|| VerificarError::driver(format!("no element with id {}", element.id)))?;

        match (target.click, forced) {
            (ClickBehavior::Detached, _) => {
                return Err(VerificarError::driver(format!("{} detached from DOM", element.id)));
            }
            (ClickBehavior::Intercepted | ClickBehavior::AlwaysBlocked, false) => {
                return Err(VerificarError::ActionBlocked {
                    element: element.id.clone(),
                    message: "<div class=\"overlay\"> intercepts pointer events".to_string(),
                });
            }
            (ClickBehavior::AlwaysBlocked, true) => {
                return Err(VerificarError::driver(format!(
                    "forced click on {} did not reach the element",
                    element.id
                )));
            }
            _ => {}
        }

        for effect in &target.on_click {
            let (id, show) = match effect {
                PageEffect::Show(id) => (id, true),
                PageEffect::Hide(id) => (id, false),
            };
            for e in state.elements.iter_mut().filter(|e| &e.id == id) {
                e.visible = show;
            }
        }
        Ok(())
    }

    async fn is_visible(&self, element: &ElementHandle) -> VerificarResult<bool> {
        let state = self.state.lock();
        Ok(state
            .elements
            .iter()
            .any(|e| e.id == element.id && e.rendered(state.clock_ms)))
    }

    async fn wait(&self, ms: u64) {
        let mut state = self.state.lock();
        state.clock_ms += ms;
        state.waited_ms += ms;
    }

    async fn screenshot(&self, path: &Path) -> VerificarResult<()> {
        self.record(format!("screenshot:{}", path.display()));
        if self.fail_screenshots {
            return Err(VerificarError::driver("screenshot target closed"));
        }
        tokio::fs::write(path, PNG_SIGNATURE).await?;
        Ok(())
    }

    async fn list_interactive_elements(&self) -> VerificarResult<Vec<InteractiveElement>> {
        self.record("list_interactive_elements".to_string());
        if self.fail_element_dump {
            return Err(VerificarError::driver("execution context was destroyed"));
        }
        let state = self.state.lock();
        Ok(state
            .elements
            .iter()
            .filter(|e| e.is_interactive() && e.rendered(state.clock_ms))
            .map(|e| InteractiveElement::new(e.role.clone(), e.accessible_name()))
            .collect())
    }

    async fn close(&self) -> VerificarResult<()> {
        self.record("close".to_string());
        Ok(())
    }
}

/// Driver that opens sessions on a scripted page
#[derive(Debug, Default)]
pub struct MockDriver {
    page: MockPage,
    calls: Arc<Mutex<Vec<String>>>,
    fail_open: bool,
}

impl MockDriver {
    /// Create a driver serving `page`
    #[must_use]
    pub fn new(page: MockPage) -> Self {
        Self {
            page,
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_open: false,
        }
    }

    /// Every `open_context` call fails
    #[must_use]
    pub const fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Call history across all sessions
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls.lock().iter().any(|c| c.starts_with(prefix))
    }

    /// Number of clicks on `id` across all sessions
    #[must_use]
    pub fn click_count(&self, id: &str) -> usize {
        count_clicks(&self.calls.lock(), id)
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Page = MockSession;

    async fn open_context(&self, config: &DriverConfig) -> VerificarResult<Self::Page> {
        self.calls.lock().push(format!(
            "open_context:{}x{}",
            config.viewport_width, config.viewport_height
        ));
        if self.fail_open {
            return Err(VerificarError::driver("Failed to launch browser: chromium not found"));
        }
        Ok(MockSession::new(self.page.clone(), Arc::clone(&self.calls)))
    }
}
