//! Browser control
//!
//! The agent drives the dApp and the wallet extension through three small
//! traits. `connector` implements them over the DevTools protocol; tests
//! implement them with scripted fakes.
//!
//! - [`BrowsingContext`]: the browser profile's single context; opens pages
//!   and reports new windows.
//! - [`PageHandle`]: one page or popup window.
//! - [`PopupWatcher`]: a subscription to windows opened after it was created.

pub mod cdp;
mod connector;
pub mod launch;
pub mod popup;
pub mod probe;
mod selector;
pub mod wait;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

pub use connector::{CdpBrowser, CdpContext, CdpPage, CdpPopupWatcher};
pub use popup::PopupAwait;
pub use probe::ReadinessProbe;
pub use selector::Selector;
pub(crate) use selector::js_string;
pub use wait::{Backoff, WaitPolicy};

/// One page or popup window
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Short description for logs
    fn label(&self) -> String;

    async fn goto(&self, url: &str) -> Result<()>;

    /// Resolve once the page's initial load has completed
    async fn wait_for_load(&self) -> Result<()>;

    /// Whether the selector currently matches an element
    async fn exists(&self, selector: &Selector) -> Result<bool>;

    /// Whether the selector matches an element that is rendered and visible
    async fn is_visible(&self, selector: &Selector) -> Result<bool>;

    /// Whether the element is rendered, has a nonzero size and is not disabled
    async fn is_actionable(&self, selector: &Selector) -> Result<bool>;

    /// Whether a `<select>` offers an option with this value
    async fn has_option(&self, selector: &Selector, value: &str) -> Result<bool>;

    /// Trusted mouse click on the element's center. Fails with
    /// `CdpError::NotActionable` unless [`is_actionable`](Self::is_actionable).
    async fn click(&self, selector: &Selector) -> Result<()>;

    /// `element.click()` from inside the page, regardless of rendering state
    async fn dom_click(&self, selector: &Selector) -> Result<()>;

    /// Replace an input's value as if typed; the input must be actionable
    async fn fill(&self, selector: &Selector, value: &str) -> Result<()>;

    /// Choose the `<option>` with the given value
    async fn select_option(&self, selector: &Selector, value: &str) -> Result<()>;

    /// Evaluate JavaScript, awaiting promises, and return its JSON value
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    async fn close(&self) -> Result<()>;

    /// Poll until the selector matches or the policy's deadline passes
    async fn wait_for(&self, selector: &Selector, policy: WaitPolicy) -> Result<()> {
        let what = format!("waiting for {} on {}", selector, self.label());
        wait::poll_until(policy, &what, move || async move {
            Ok(self.exists(selector).await?.then_some(()))
        })
        .await
    }

    /// Poll until the element can take a click or input
    async fn wait_actionable(&self, selector: &Selector, policy: WaitPolicy) -> Result<()> {
        let what = format!("waiting for {} to be actionable on {}", selector, self.label());
        wait::poll_until(policy, &what, move || async move {
            Ok(self.is_actionable(selector).await?.then_some(()))
        })
        .await
    }
}

/// Subscription to windows opened in a context
#[async_trait]
pub trait PopupWatcher: Send {
    type Page: PageHandle;

    /// Next window opened since the subscription; `None` once the context is gone
    async fn next_popup(&mut self) -> Result<Option<Self::Page>>;
}

/// The browser profile's active browsing context
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    type Page: PageHandle + 'static;
    type Watcher: PopupWatcher<Page = Self::Page> + 'static;

    /// Open a fresh page owned by the agent
    async fn new_page(&self) -> Result<Self::Page>;

    /// Start watching for new windows. Windows opened before this call are
    /// never reported.
    fn watch_popups(&self) -> Self::Watcher;

    /// Close everything the agent opened
    async fn close(&self) -> Result<()>;
}
