//! Scripted in-memory [`Driver`] for pipeline tests.
//!
//! Pages are keyed by URL fragments (the longest fragment contained in the
//! requested URL wins). Clicks and script evaluations can swap the current
//! page to simulate client-side rendering.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;

use crate::driver::{Driver, Launcher};
use crate::error::DriverError;
use crate::parse_helpers::exists;

const BLANK: &str = "<html><head></head><body></body></html>";

#[derive(Debug, Clone)]
enum Effect {
    Replace(String),
    Goto(String),
    Nothing,
}

#[derive(Debug, Clone)]
struct Rule {
    key: String,
    result: serde_json::Value,
    effect: Effect,
}

#[derive(Debug, Default)]
struct State {
    routes: Vec<(String, String)>,
    click_rules: Vec<Rule>,
    eval_rules: Vec<Rule>,
    current_url: String,
    current_html: String,
    failing_reads: usize,
    fail_navigation_to: Vec<String>,
    calls: Vec<String>,
    typed: Vec<(String, String)>,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDriver {
    state: Arc<Mutex<State>>,
}

impl FakeDriver {
    pub(crate) fn new() -> Self {
        let driver = Self::default();
        driver.lock().current_html = BLANK.to_string();
        driver
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake driver state")
    }

    pub(crate) fn with_page(self, url_fragment: &str, html: &str) -> Self {
        self.lock()
            .routes
            .push((url_fragment.to_string(), html.to_string()));
        self
    }

    /// Clicking `selector` (when present) replaces the current document.
    pub(crate) fn on_click(self, selector: &str, html: &str) -> Self {
        self.lock().click_rules.push(Rule {
            key: selector.to_string(),
            result: serde_json::Value::Null,
            effect: Effect::Replace(html.to_string()),
        });
        self
    }

    /// Clicking `selector` (when present) navigates to `url`.
    pub(crate) fn on_click_goto(self, selector: &str, url: &str) -> Self {
        self.lock().click_rules.push(Rule {
            key: selector.to_string(),
            result: serde_json::Value::Null,
            effect: Effect::Goto(url.to_string()),
        });
        self
    }

    /// A script containing `fragment` returns `result` and replaces the page
    /// with `html` when given.
    pub(crate) fn on_eval(
        self,
        fragment: &str,
        result: serde_json::Value,
        html: Option<&str>,
    ) -> Self {
        self.lock().eval_rules.push(Rule {
            key: fragment.to_string(),
            result,
            effect: html.map_or(Effect::Nothing, |h| Effect::Replace(h.to_string())),
        });
        self
    }

    pub(crate) fn fail_navigation_to(self, url_fragment: &str) -> Self {
        self.lock().fail_navigation_to.push(url_fragment.to_string());
        self
    }

    pub(crate) fn fail_next_reads(&self, count: usize) {
        self.lock().failing_reads = count;
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("navigate ").map(ToOwned::to_owned))
            .collect()
    }

    pub(crate) fn typed(&self) -> Vec<(String, String)> {
        self.lock().typed.clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn load(state: &mut State, url: &str) {
        let html = state
            .routes
            .iter()
            .filter(|(fragment, _)| url.contains(fragment.as_str()))
            .max_by_key(|(fragment, _)| fragment.len())
            .map_or_else(|| BLANK.to_string(), |(_, html)| html.clone());
        state.current_url = url.to_string();
        state.current_html = html;
    }

    fn apply(state: &mut State, effect: &Effect) {
        match effect {
            Effect::Replace(html) => state.current_html.clone_from(html),
            Effect::Goto(url) => Self::load(state, url),
            Effect::Nothing => {}
        }
    }
}

fn selector_present(html: &str, selector: &str) -> bool {
    let doc = Html::parse_document(html);
    exists(&doc, selector)
}

#[async_trait]
impl Driver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.calls.push(format!("navigate {url}"));
        if state
            .fail_navigation_to
            .iter()
            .any(|f| url.contains(f.as_str()))
        {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        Self::load(&mut state, url);
        Ok(())
    }

    async fn wait_for_navigation(&self, _bound: Duration) -> Result<bool, DriverError> {
        Ok(false)
    }

    async fn wait_for_selector(&self, selector: &str, bound: Duration) -> Result<(), DriverError> {
        let html = self.lock().current_html.clone();
        if selector_present(&html, selector) {
            Ok(())
        } else {
            Err(DriverError::Timeout {
                what: format!("selector {selector}"),
                timeout_ms: u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let mut state = self.lock();
        state.calls.push("evaluate".to_string());
        let rule = state
            .eval_rules
            .iter()
            .find(|r| script.contains(r.key.as_str()))
            .cloned();
        match rule {
            Some(rule) => {
                Self::apply(&mut state, &rule.effect);
                Ok(rule.result)
            }
            None => Ok(serde_json::Value::Null),
        }
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        _delay: Duration,
    ) -> Result<(), DriverError> {
        let mut state = self.lock();
        if !selector_present(&state.current_html, selector) {
            return Err(DriverError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        state.calls.push(format!("type {selector}"));
        state.typed.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        if !selector_present(&state.current_html, selector) {
            return Err(DriverError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        state.calls.push(format!("click {selector}"));
        let rule = state
            .click_rules
            .iter()
            .find(|r| r.key == selector)
            .cloned();
        if let Some(rule) = rule {
            Self::apply(&mut state, &rule.effect);
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.lock().current_url.clone())
    }

    async fn content(&self) -> Result<String, DriverError> {
        let mut state = self.lock();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(DriverError::Protocol("page crashed".to_string()));
        }
        Ok(state.current_html.clone())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.calls.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}

/// Hands out clones of one [`FakeDriver`] so tests can inspect it after the
/// job has consumed its boxed driver.
#[derive(Debug, Clone)]
pub(crate) struct FakeLauncher {
    pub(crate) driver: FakeDriver,
    pub(crate) fail: bool,
}

impl FakeLauncher {
    pub(crate) fn new(driver: FakeDriver) -> Self {
        Self {
            driver,
            fail: false,
        }
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Driver>, DriverError> {
        if self.fail {
            return Err(DriverError::Launch("chrome not found".to_string()));
        }
        Ok(Box::new(self.driver.clone()))
    }
}
