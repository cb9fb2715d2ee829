//! Waiting for windows spawned by a UI action
//!
//! A `PopupAwait` owns one subscription to the context's new-window
//! notifications. It is created before the first trigger and reused for
//! every popup in a chained sequence, so a popup that opens while the
//! previous one is still being handled is buffered rather than missed.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::cdp::CdpError;
use super::wait::settle;
use super::{BrowsingContext, PageHandle, PopupWatcher};
use crate::config::Timings;
use crate::{Error, Result};

pub struct PopupAwait<W> {
    watcher: W,
    /// How long a popup may take to appear
    grace: Duration,
    /// Minimum delay before a popup is handed back
    settle: Duration,
}

impl<W: PopupWatcher> PopupAwait<W> {
    pub fn new(watcher: W, grace: Duration, settle: Duration) -> Self {
        Self {
            watcher,
            grace,
            settle,
        }
    }

    /// Subscribe to `context` with the configured popup timings
    pub fn from_context<C>(context: &C, timings: &Timings) -> Self
    where
        C: BrowsingContext<Watcher = W>,
    {
        Self::new(
            context.watch_popups(),
            timings.popup_grace(),
            timings.popup_settle(),
        )
    }

    /// Run `trigger` while waiting for the popup it opens.
    ///
    /// `None` when nothing opened within the grace period. A failing
    /// trigger fails the whole await.
    pub async fn after<Fut>(&mut self, trigger: Fut) -> Result<Option<W::Page>>
    where
        Fut: Future<Output = Result<()>>,
    {
        let ((), popup) = tokio::try_join!(trigger, self.next())?;
        Ok(popup)
    }

    /// Like `after`, but a missing popup is a timeout
    pub async fn expect_after<Fut>(&mut self, trigger: Fut, what: &str) -> Result<W::Page>
    where
        Fut: Future<Output = Result<()>>,
    {
        let popup = self.after(trigger).await?;
        self.required(popup, what)
    }

    /// Next popup opened since the subscription, once it has loaded
    pub async fn next(&mut self) -> Result<Option<W::Page>> {
        let grace = self.grace;
        let (arrived, ()) = tokio::join!(
            tokio::time::timeout(grace, self.watcher.next_popup()),
            settle(self.settle),
        );

        let page = match arrived {
            Err(_) => {
                debug!(grace_ms = grace.as_millis() as u64, "No popup opened");
                return Ok(None);
            }
            Ok(Ok(Some(page))) => page,
            Ok(Ok(None)) => return Err(CdpError::SessionClosed.into()),
            Ok(Err(e)) => return Err(e),
        };

        page.wait_for_load().await?;
        debug!(popup = %page.label(), "Popup loaded");
        Ok(Some(page))
    }

    /// Like `next`, but a missing popup is a timeout
    pub async fn expect(&mut self, what: &str) -> Result<W::Page> {
        let popup = self.next().await?;
        self.required(popup, what)
    }

    fn required(&self, popup: Option<W::Page>, what: &str) -> Result<W::Page> {
        popup.ok_or_else(|| {
            Error::Timeout(format!(
                "{} popup did not open within {} ms",
                what,
                self.grace.as_millis()
            ))
        })
    }
}
