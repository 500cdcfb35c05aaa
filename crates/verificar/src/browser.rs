//! Chromium driver over the Chrome DevTools Protocol.
//!
//! Each [`ChromiumDriver::open_context`] launches its own browser process,
//! so concurrent runs never share state. Elements found by
//! [`PageDriver::locate`] are tagged with a `data-verificar-id` attribute,
//! which is what [`ElementHandle::id`] refers to afterwards.
//!
//! Overlay interception is detected the way a real pointer would see it:
//! `document.elementFromPoint` at the element's centre must be the element
//! or one of its descendants.

#![allow(clippy::significant_drop_tightening, clippy::items_after_statements)]

use crate::driver::{Driver, DriverConfig, ElementHandle, InteractiveElement, PageDriver};
use crate::result::{VerificarError, VerificarResult};
use crate::strategy::StrategyKind;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

/// Attribute used to address located elements
pub const ELEMENT_ID_ATTR: &str = "data-verificar-id";

const HELPERS: &str = r"
const __visible = el => {
  const r = el.getBoundingClientRect();
  const s = getComputedStyle(el);
  return r.width > 0 && r.height > 0
    && s.visibility !== 'hidden' && s.display !== 'none' && s.opacity !== '0';
};
const __text = el => (el.innerText || el.textContent || '').trim();
const __name = el => (el.getAttribute('aria-label') || __text(el)).trim();
const __implicit = {
  A: 'link', BUTTON: 'button', SELECT: 'combobox',
  OPTION: 'option', TEXTAREA: 'textbox', INPUT: 'textbox',
};
const __role = el => el.getAttribute('role') || __implicit[el.tagName] || 'generic';
const __byId = id => [...document.querySelectorAll('[data-verificar-id]')]
  .find(e => e.dataset.verificarId === id);
const __deepest = (els, pred) => els.filter(el => pred(el) && ![...el.children].some(pred));
";

const INTERACTIVE_SELECTOR: &str = "button, a[href], select, \
     input[type=button], input[type=submit], [role=button], [role=link], \
     [role=menuitem], [role=tab], [role=option], [role=checkbox]";

/// What the locate script looks for
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LocateQuery<'a> {
    ExactText { value: &'a str },
    PartialText { value: &'a str },
    Role { role: &'a str, name: &'a str },
    AriaLabel { value: &'a str },
    Positional { selector: &'a str, index: usize },
}

impl<'a> LocateQuery<'a> {
    fn new(kind: &'a StrategyKind, regions: &'a BTreeMap<String, String>) -> Self {
        match kind {
            StrategyKind::ExactText(v) => Self::ExactText { value: v },
            StrategyKind::PartialText(v) => Self::PartialText { value: v },
            StrategyKind::Role { role, name } => Self::Role { role, name },
            StrategyKind::AriaLabel(v) => Self::AriaLabel { value: v },
            StrategyKind::Positional { region, index } => Self::Positional {
                selector: regions.get(region).map_or(region.as_str(), String::as_str),
                index: *index,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct Located {
    id: String,
    role: String,
    name: String,
}

/// A bare `null` evaluates to a remote object without a value, so the hit
/// is wrapped
#[derive(Debug, Deserialize)]
struct LocateReply {
    hit: Option<Located>,
}

fn locate_script(query: &LocateQuery<'_>) -> VerificarResult<String> {
    let query = serde_json::to_string(query)?;
    Ok(format!(
        r"(() => {{
{HELPERS}
const q = {query};
const all = () => [...document.querySelectorAll('body *')];
let found = [];
switch (q.kind) {{
  case 'exact_text': found = __deepest(all(), el => __text(el) === q.value.trim()); break;
  case 'partial_text': {{
    const needle = q.value.toLowerCase();
    found = __deepest(all(), el => __text(el).toLowerCase().includes(needle));
    break;
  }}
  case 'role': found = all().filter(el => __role(el) === q.role && __name(el) === q.name); break;
  case 'aria_label':
    found = [...document.querySelectorAll('[aria-label]')]
      .filter(el => el.getAttribute('aria-label') === q.value);
    break;
  case 'positional':
    found = [[...document.querySelectorAll(q.selector)].filter(__visible)[q.index]]
      .filter(Boolean);
    break;
}}
const el = found.find(__visible) || found[0];
if (!el) return {{ hit: null }};
if (!el.dataset.verificarId) {{
  window.__verificarSeq = (window.__verificarSeq || 0) + 1;
  el.dataset.verificarId = 'v' + window.__verificarSeq;
}}
return {{ hit: {{ id: el.dataset.verificarId, role: __role(el), name: __name(el) }} }};
}})()"
    ))
}

fn element_script(id: &str, body: &str) -> VerificarResult<String> {
    let id = serde_json::to_string(id)?;
    Ok(format!(
        r"(() => {{
{HELPERS}
const el = __byId({id});
{body}
}})()"
    ))
}

/// Outcome of the pre-click hit test
#[derive(Debug, Deserialize)]
#[serde(tag = "status", content = "by", rename_all = "snake_case")]
enum HitTest {
    Clear,
    Missing,
    Blocked(String),
}

const HIT_TEST: &str = r"
if (!el) return { status: 'missing' };
el.scrollIntoView({ block: 'center', inline: 'center' });
const r = el.getBoundingClientRect();
const top = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2);
if (top && top !== el && !el.contains(top)) {
  const cls = typeof top.className === 'string' && top.className
    ? '.' + top.className.split(' ')[0]
    : '';
  return { status: 'blocked', by: top.tagName.toLowerCase() + cls };
}
return { status: 'clear' };
";

/// Launches one Chromium instance per browsing context
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumDriver;

impl ChromiumDriver {
    /// Create a driver
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for ChromiumDriver {
    type Page = ChromiumPage;

    async fn open_context(&self, config: &DriverConfig) -> VerificarResult<ChromiumPage> {
        ChromiumPage::launch(config).await
    }
}

/// A page in its own Chromium process
#[derive(Debug)]
pub struct ChromiumPage {
    browser: Mutex<CdpBrowser>,
    page: CdpPage,
    regions: BTreeMap<String, String>,
    handle: tokio::task::JoinHandle<()>,
}

fn driver_err(context: &str) -> impl Fn(chromiumoxide::error::CdpError) -> VerificarError + '_ {
    move |e| VerificarError::driver(format!("{context}: {e}"))
}

impl ChromiumPage {
    async fn launch(config: &DriverConfig) -> VerificarResult<Self> {
        let mut builder =
            CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder
            .build()
            .map_err(|e| VerificarError::driver(format!("browser config: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config)
            .await
            .map_err(driver_err("Failed to launch browser"))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(driver_err("new page"))?;

        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(config.viewport_width),
            i64::from(config.viewport_height),
            1.0,
            config.mobile,
        ))
        .await
        .map_err(driver_err("viewport emulation"))?;
        if config.mobile {
            page.execute(SetTouchEmulationEnabledParams::new(true))
                .await
                .map_err(driver_err("touch emulation"))?;
        }

        tracing::debug!(
            width = config.viewport_width,
            height = config.viewport_height,
            mobile = config.mobile,
            headless = config.headless,
            "chromium context opened"
        );

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            regions: config.regions.clone(),
            handle,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> VerificarResult<T> {
        let result = self.page.evaluate(script).await.map_err(driver_err("evaluate"))?;
        result
            .into_value()
            .map_err(|e| VerificarError::driver(format!("evaluate result: {e}")))
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str) -> VerificarResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| VerificarError::driver(format!("navigation to {url} failed: {e}")))?;
        Ok(())
    }

    async fn locate(&self, kind: &StrategyKind) -> VerificarResult<Option<ElementHandle>> {
        let script = locate_script(&LocateQuery::new(kind, &self.regions))?;
        let reply: LocateReply = self.eval(script).await?;
        Ok(reply.hit.map(|l| ElementHandle::new(l.id).with_role(l.role).with_name(l.name)))
    }

    async fn click(&self, element: &ElementHandle, forced: bool) -> VerificarResult<()> {
        if forced {
            let script =
                element_script(&element.id, "if (!el) return false; el.click(); return true;")?;
            let clicked: bool = self.eval(script).await?;
            if !clicked {
                return Err(VerificarError::driver(format!("{} is no longer attached", element.id)));
            }
            return Ok(());
        }

        match self.eval::<HitTest>(element_script(&element.id, HIT_TEST)?).await? {
            HitTest::Missing => Err(VerificarError::driver(format!(
                "{} is no longer attached",
                element.id
            ))),
            HitTest::Blocked(by) => Err(VerificarError::ActionBlocked {
                element: element.id.clone(),
                message: format!("<{by}> intercepts pointer events"),
            }),
            HitTest::Clear => {
                let selector = format!("[{ELEMENT_ID_ATTR}=\"{}\"]", element.id);
                self.page
                    .find_element(selector)
                    .await
                    .map_err(driver_err("find element"))?
                    .click()
                    .await
                    .map_err(driver_err("click"))?;
                Ok(())
            }
        }
    }

    async fn is_visible(&self, element: &ElementHandle) -> VerificarResult<bool> {
        self.eval(element_script(&element.id, "return !!el && __visible(el);")?).await
    }

    async fn wait(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn screenshot(&self, path: &Path) -> VerificarResult<()> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = self.page.execute(params).await.map_err(driver_err("screenshot"))?;

        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| VerificarError::driver(format!("screenshot decode: {e}")))?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn list_interactive_elements(&self) -> VerificarResult<Vec<InteractiveElement>> {
        let selector = serde_json::to_string(INTERACTIVE_SELECTOR)?;
        let script = format!(
            r"(() => {{
{HELPERS}
return [...document.querySelectorAll({selector})]
  .filter(__visible)
  .map(el => ({{ role: __role(el), accessible_name: __name(el) }}));
}})()"
        );
        self.eval(script).await
    }

    async fn close(&self) -> VerificarResult<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await.map_err(driver_err("close browser"));
        self.handle.abort();
        closed.map(|_| ())
    }
}
