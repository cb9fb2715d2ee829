//! DevTools-backed implementation of the browser traits
//!
//! `CdpBrowser::connect` attaches to a browser that is already running; it
//! never launches one. The browser must expose exactly one browsing context
//! owning page targets, which becomes the agent's context.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::cdp::{CdpClient, CdpError, PageSession, TargetInfo};
use super::selector::js_string;
use super::{BrowsingContext, PageHandle, PopupWatcher, Selector};
use crate::Result;

/// Connection to a running browser
pub struct CdpBrowser {
    client: CdpClient,
}

impl CdpBrowser {
    /// Attach to the browser behind a readiness-confirmed DevTools endpoint
    pub async fn connect(endpoint: &url::Url) -> Result<Self> {
        let client = CdpClient::connect(endpoint.as_str()).await?;
        client.discover_targets().await?;
        info!(ws = %client.browser_ws_url(), "Attached to browser");
        Ok(Self { client })
    }

    /// The browser's single browsing context.
    ///
    /// Fails with `CdpError::ContextCount` unless exactly one context owns
    /// page targets.
    pub async fn default_context(&self) -> Result<CdpContext> {
        let targets = self.client.get_targets().await?;
        let context_id = single_page_context(&targets)?;
        debug!(context = %context_id, "Using browsing context");

        Ok(CdpContext {
            client: self.client.clone(),
            context_id,
            opened: Arc::new(Mutex::new(HashSet::new())),
        })
    }
}

/// The one context id shared by all page targets
fn single_page_context(targets: &[TargetInfo]) -> std::result::Result<String, CdpError> {
    let mut contexts: Vec<&str> = targets
        .iter()
        .filter(|t| t.is_page())
        .filter_map(|t| t.browser_context_id.as_deref())
        .collect();
    contexts.sort_unstable();
    contexts.dedup();

    match contexts.as_slice() {
        [only] => Ok(only.to_string()),
        other => Err(CdpError::ContextCount(other.len())),
    }
}

/// The agent's browsing context
pub struct CdpContext {
    client: CdpClient,
    context_id: String,
    /// Targets opened by the agent itself
    opened: Arc<Mutex<HashSet<String>>>,
}

impl CdpContext {
    pub fn id(&self) -> &str {
        &self.context_id
    }
}

#[async_trait]
impl BrowsingContext for CdpContext {
    type Page = CdpPage;
    type Watcher = CdpPopupWatcher;

    async fn new_page(&self) -> Result<CdpPage> {
        let target_id = self.client.create_target(&self.context_id).await?;
        self.opened.lock().insert(target_id.clone());
        let session = PageSession::attach(&self.client, &target_id).await?;
        debug!(target = %target_id, "Opened page");
        Ok(CdpPage { session })
    }

    fn watch_popups(&self) -> CdpPopupWatcher {
        CdpPopupWatcher {
            client: self.client.clone(),
            context_id: self.context_id.clone(),
            opened: self.opened.clone(),
            events: self.client.subscribe_targets(),
        }
    }

    async fn close(&self) -> Result<()> {
        let opened: Vec<String> = self.opened.lock().drain().collect();
        for target_id in opened {
            if let Err(e) = self.client.close_target(&target_id).await {
                warn!(target = %target_id, error = %e, "Failed to close page");
            }
        }
        Ok(())
    }
}

/// Reports page targets created in the agent's context by someone else
/// (the dApp or the wallet extension)
pub struct CdpPopupWatcher {
    client: CdpClient,
    context_id: String,
    opened: Arc<Mutex<HashSet<String>>>,
    events: broadcast::Receiver<TargetInfo>,
}

/// A page target in `context_id` that the agent did not open itself
fn is_popup_target(info: &TargetInfo, context_id: &str, opened: &HashSet<String>) -> bool {
    info.is_page()
        && info.browser_context_id.as_deref() == Some(context_id)
        && !opened.contains(&info.target_id)
}

#[async_trait]
impl PopupWatcher for CdpPopupWatcher {
    type Page = CdpPage;

    async fn next_popup(&mut self) -> Result<Option<CdpPage>> {
        loop {
            let info = match self.events.recv().await {
                Ok(info) => info,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed target notifications");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            };

            let popup = is_popup_target(&info, &self.context_id, &self.opened.lock());
            if !popup {
                continue;
            }

            debug!(target = %info.target_id, url = %info.url, "Popup opened");
            let session = PageSession::attach(&self.client, &info.target_id).await?;
            return Ok(Some(CdpPage { session }));
        }
    }
}

/// JS statement returning `'inactive'` unless `el` can take input
const ACTIONABLE_GUARD: &str = "const cs = getComputedStyle(el); const box = el.getBoundingClientRect(); \
     if (cs.visibility === 'hidden' || cs.display === 'none' || box.width === 0 || box.height === 0 \
         || el.disabled || el.getAttribute('aria-disabled') === 'true') return 'inactive';";

/// A page or popup driven over DevTools
#[derive(Clone)]
pub struct CdpPage {
    session: PageSession,
}

impl CdpPage {
    pub fn session(&self) -> &PageSession {
        &self.session
    }

    /// Run `body` with `el` bound to the selector's element; `body` must
    /// return a value, and a missing element yields `null`.
    async fn with_element(&self, selector: &Selector, body: &str) -> Result<Value> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return null; {} }})()",
            selector.js_find(),
            body
        );
        Ok(self.session.evaluate(&script).await?)
    }

    async fn require_element(&self, selector: &Selector, body: &str) -> Result<Value> {
        let value = self.with_element(selector, body).await?;
        if value.is_null() {
            return Err(CdpError::ElementNotFound(selector.to_string()).into());
        }
        Ok(value)
    }

    /// Like `require_element`, but the element must also be actionable
    async fn require_actionable(&self, selector: &Selector, body: &str) -> Result<Value> {
        let value = self
            .require_element(selector, &format!("{} {}", ACTIONABLE_GUARD, body))
            .await?;
        if value.as_str() == Some("inactive") {
            return Err(CdpError::NotActionable(selector.to_string()).into());
        }
        Ok(value)
    }
}

#[async_trait]
impl PageHandle for CdpPage {
    fn label(&self) -> String {
        format!("page {}", self.session.target_id())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        Ok(self.session.navigate(url).await?)
    }

    async fn wait_for_load(&self) -> Result<()> {
        Ok(self.session.wait_for_load().await?)
    }

    async fn exists(&self, selector: &Selector) -> Result<bool> {
        let value = self.with_element(selector, "return true;").await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_visible(&self, selector: &Selector) -> Result<bool> {
        let value = self
            .with_element(
                selector,
                "const s = getComputedStyle(el); const r = el.getBoundingClientRect(); \
                 return s.visibility !== 'hidden' && s.display !== 'none' && r.width > 0 && r.height > 0;",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_actionable(&self, selector: &Selector) -> Result<bool> {
        let value = self
            .with_element(selector, &format!("{} return true;", ACTIONABLE_GUARD))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn has_option(&self, selector: &Selector, value: &str) -> Result<bool> {
        let body = format!(
            "return Array.from(el.options || []).some(o => o.value === {});",
            js_string(value)
        );
        let found = self.with_element(selector, &body).await?;
        Ok(found.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        let center = self
            .require_actionable(
                selector,
                "el.scrollIntoView({ block: 'center', inline: 'center' }); \
                 const r = el.getBoundingClientRect(); \
                 return { x: r.left + r.width / 2, y: r.top + r.height / 2 };",
            )
            .await?;

        let (x, y) = match (center["x"].as_f64(), center["y"].as_f64()) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                return Err(CdpError::InvalidResponse(format!(
                    "No coordinates for {}",
                    selector
                ))
                .into())
            }
        };
        Ok(self.session.click_at(x, y).await?)
    }

    async fn dom_click(&self, selector: &Selector) -> Result<()> {
        self.require_element(selector, "el.click(); return true;")
            .await?;
        Ok(())
    }

    async fn fill(&self, selector: &Selector, value: &str) -> Result<()> {
        self.require_actionable(
            selector,
            "el.focus(); if (typeof el.select === 'function') el.select(); return true;",
        )
        .await?;

        if value.is_empty() {
            self.with_element(
                selector,
                "el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true })); return true;",
            )
            .await?;
            return Ok(());
        }

        Ok(self.session.insert_text(value).await?)
    }

    async fn select_option(&self, selector: &Selector, value: &str) -> Result<()> {
        let body = format!(
            "const v = {}; \
             if (!Array.from(el.options || []).some(o => o.value === v)) return 'missing'; \
             el.value = v; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return 'ok';",
            js_string(value)
        );
        let outcome = self.require_element(selector, &body).await?;

        if outcome.as_str() == Some("missing") {
            return Err(CdpError::ElementNotFound(format!(
                "option {} in {}",
                value, selector
            ))
            .into());
        }
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        Ok(self.session.evaluate(expression).await?)
    }

    async fn close(&self) -> Result<()> {
        Ok(self.session.close().await?)
    }
}
