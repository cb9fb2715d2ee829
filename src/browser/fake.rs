//! Scripted in-memory browser for tests
//!
//! Every page shares one interaction log with its context, so a test can
//! assert on the exact order of clicks and fills across the dApp page and
//! its popups. Clicking a selector can be scripted to open popups.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::cdp::CdpError;
use super::{BrowsingContext, PageHandle, PopupWatcher, Selector};
use crate::Result;

type Evaluator = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

#[derive(Default)]
struct Hub {
    log: Mutex<Vec<String>>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<FakePage>>>,
}

impl Hub {
    fn record(&self, entry: String) {
        self.log.lock().push(entry);
    }

    fn open(&self, popup: FakePage) {
        self.record(format!("{} opened", popup.name()));
        self.watchers
            .lock()
            .retain(|tx| tx.send(popup.clone()).is_ok());
    }
}

/// Fake browsing context with one main page
#[derive(Clone)]
pub(crate) struct FakeContext {
    hub: Arc<Hub>,
    main: FakePage,
}

impl FakeContext {
    pub fn new() -> Self {
        let hub = Arc::new(Hub::default());
        let main = FakePage::with_hub("dapp", hub.clone());
        Self { hub, main }
    }

    /// The page `new_page` hands out
    pub fn main(&self) -> FakePage {
        self.main.clone()
    }

    /// A page that can later be opened as a popup
    pub fn page(&self, name: &str) -> FakePage {
        FakePage::with_hub(name, self.hub.clone())
    }

    /// Open a popup as if some page had spawned it
    pub fn open(&self, popup: &FakePage) {
        self.hub.open(popup.clone());
    }

    pub fn log(&self) -> Vec<String> {
        self.hub.log.lock().clone()
    }

    /// Number of log entries equal to `entry`
    pub fn count(&self, entry: &str) -> usize {
        self.hub.log.lock().iter().filter(|e| *e == entry).count()
    }

    /// Position of the first log entry equal to `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.hub.log.lock().iter().position(|e| e == entry)
    }
}

#[async_trait]
impl BrowsingContext for FakeContext {
    type Page = FakePage;
    type Watcher = FakeWatcher;

    async fn new_page(&self) -> Result<FakePage> {
        self.hub.record("new_page".to_string());
        Ok(self.main.clone())
    }

    fn watch_popups(&self) -> FakeWatcher {
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.watchers.lock().push(tx);
        FakeWatcher { rx }
    }

    async fn close(&self) -> Result<()> {
        self.hub.record("context closed".to_string());
        self.hub.watchers.lock().clear();
        Ok(())
    }
}

pub(crate) struct FakeWatcher {
    rx: mpsc::UnboundedReceiver<FakePage>,
}

#[async_trait]
impl PopupWatcher for FakeWatcher {
    type Page = FakePage;

    async fn next_popup(&mut self) -> Result<Option<FakePage>> {
        Ok(self.rx.recv().await)
    }
}

struct PageState {
    name: String,
    hub: Arc<Hub>,
    present: Mutex<HashSet<String>>,
    visible: Mutex<HashSet<String>>,
    disabled: Mutex<HashSet<String>>,
    /// Offered values per `<select>`; unlisted selects accept any value
    options: Mutex<HashMap<String, HashSet<String>>>,
    spawns: Mutex<HashMap<String, Vec<FakePage>>>,
    hides: Mutex<Vec<(String, String)>>,
    evaluator: Mutex<Option<Evaluator>>,
    load_delay: Mutex<Duration>,
    loaded: AtomicBool,
}

/// Fake page; clones share state
#[derive(Clone)]
pub(crate) struct FakePage {
    state: Arc<PageState>,
}

impl fmt::Debug for FakePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FakePage").field(&self.state.name).finish()
    }
}

impl FakePage {
    fn with_hub(name: &str, hub: Arc<Hub>) -> Self {
        Self {
            state: Arc::new(PageState {
                name: name.to_string(),
                hub,
                present: Mutex::new(HashSet::new()),
                visible: Mutex::new(HashSet::new()),
                disabled: Mutex::new(HashSet::new()),
                options: Mutex::new(HashMap::new()),
                spawns: Mutex::new(HashMap::new()),
                hides: Mutex::new(Vec::new()),
                evaluator: Mutex::new(None),
                load_delay: Mutex::new(Duration::ZERO),
                loaded: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Add a rendered, visible element
    pub fn with(self, selector: &Selector) -> Self {
        self.state.present.lock().insert(selector.to_string());
        self.state.visible.lock().insert(selector.to_string());
        self
    }

    /// Add an element that exists but is not rendered
    pub fn with_hidden(self, selector: &Selector) -> Self {
        self.state.present.lock().insert(selector.to_string());
        self
    }

    /// Add a visible element that is disabled until [`enable`](Self::enable)
    pub fn with_disabled(self, selector: &Selector) -> Self {
        self.state.disabled.lock().insert(selector.to_string());
        self.with(selector)
    }

    pub fn enable(&self, selector: &Selector) {
        self.state.disabled.lock().remove(&selector.to_string());
    }

    /// Restrict a `<select>` to the given option values
    pub fn with_options(self, selector: &Selector, values: &[&str]) -> Self {
        self.state.options.lock().insert(
            selector.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    /// Offer one more option, as a dApp does once its token list loads
    pub fn add_option(&self, selector: &Selector, value: &str) {
        self.state
            .options
            .lock()
            .entry(selector.to_string())
            .or_default()
            .insert(value.to_string());
    }

    /// Clicking `selector` opens `popups`, in order
    pub fn spawns(self, selector: &Selector, popups: Vec<FakePage>) -> Self {
        self.state
            .spawns
            .lock()
            .entry(selector.to_string())
            .or_default()
            .extend(popups);
        self
    }

    /// Clicking `trigger` removes `target` from the page
    pub fn hides(self, trigger: &Selector, target: &Selector) -> Self {
        self.state
            .hides
            .lock()
            .push((trigger.to_string(), target.to_string()));
        self
    }

    pub fn on_evaluate<F>(self, evaluator: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        *self.state.evaluator.lock() = Some(Arc::new(evaluator));
        self
    }

    pub fn load_delay(self, delay: Duration) -> Self {
        *self.state.load_delay.lock() = delay;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.state.loaded.load(Ordering::SeqCst)
    }

    fn record(&self, action: &str, selector: &Selector) {
        self.state
            .hub
            .record(format!("{} {} {}", self.state.name, action, selector));
    }

    fn record_value(&self, action: &str, selector: &Selector, value: &str) {
        self.state.hub.record(format!(
            "{} {} {} = {}",
            self.state.name, action, selector, value
        ));
    }

    fn require(&self, selector: &Selector) -> Result<()> {
        if self.state.present.lock().contains(&selector.to_string()) {
            Ok(())
        } else {
            Err(CdpError::ElementNotFound(format!("{} on {}", selector, self.state.name)).into())
        }
    }

    fn actionable(&self, selector: &Selector) -> bool {
        let key = selector.to_string();
        self.state.visible.lock().contains(&key) && !self.state.disabled.lock().contains(&key)
    }

    fn require_actionable(&self, selector: &Selector) -> Result<()> {
        self.require(selector)?;
        if self.actionable(selector) {
            Ok(())
        } else {
            Err(CdpError::NotActionable(format!("{} on {}", selector, self.state.name)).into())
        }
    }

    fn offers(&self, selector: &Selector, value: &str) -> bool {
        self.state
            .options
            .lock()
            .get(&selector.to_string())
            .map_or(true, |values| values.contains(value))
    }

    fn fire(&self, selector: &Selector) {
        let clicked = selector.to_string();
        for (trigger, target) in self.state.hides.lock().iter() {
            if *trigger == clicked {
                self.state.present.lock().remove(target);
                self.state.visible.lock().remove(target);
            }
        }

        let popups = self
            .state
            .spawns
            .lock()
            .remove(&selector.to_string())
            .unwrap_or_default();
        for popup in popups {
            self.state.hub.open(popup);
        }
    }
}

#[async_trait]
impl PageHandle for FakePage {
    fn label(&self) -> String {
        self.state.name.clone()
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.state
            .hub
            .record(format!("{} goto {}", self.state.name, url));
        self.state.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<()> {
        let delay = *self.state.load_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self, selector: &Selector) -> Result<bool> {
        Ok(self.state.present.lock().contains(&selector.to_string()))
    }

    async fn is_visible(&self, selector: &Selector) -> Result<bool> {
        Ok(self.state.visible.lock().contains(&selector.to_string()))
    }

    async fn is_actionable(&self, selector: &Selector) -> Result<bool> {
        Ok(self.actionable(selector))
    }

    async fn has_option(&self, selector: &Selector, value: &str) -> Result<bool> {
        Ok(self.require(selector).is_ok() && self.offers(selector, value))
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        self.require_actionable(selector)?;
        self.record("click", selector);
        self.fire(selector);
        Ok(())
    }

    async fn dom_click(&self, selector: &Selector) -> Result<()> {
        self.require(selector)?;
        self.record("dom_click", selector);
        self.fire(selector);
        Ok(())
    }

    async fn fill(&self, selector: &Selector, value: &str) -> Result<()> {
        self.require_actionable(selector)?;
        self.record_value("fill", selector, value);
        Ok(())
    }

    async fn select_option(&self, selector: &Selector, value: &str) -> Result<()> {
        self.require(selector)?;
        if !self.offers(selector, value) {
            return Err(CdpError::ElementNotFound(format!("option {} in {}", value, selector)).into());
        }
        self.record_value("select", selector, value);
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let evaluator = self.state.evaluator.lock().clone();
        match evaluator {
            Some(evaluate) => evaluate(expression),
            None => Ok(Value::Null),
        }
    }

    async fn close(&self) -> Result<()> {
        self.state
            .hub
            .record(format!("{} closed", self.state.name));
        Ok(())
    }
}
