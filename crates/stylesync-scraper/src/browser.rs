//! Chromium-backed [`Driver`] built on chromiumoxide.
//!
//! A job either launches a local Chrome/Chromium or attaches to an already
//! running one whose DevTools endpoint is discovered through `/json/version`.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use stylesync_core::BrowserSettings;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::driver::{Driver, Launcher};
use crate::error::DriverError;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Launches (or attaches to) a Chromium instance per job.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    settings: BrowserSettings,
    http: reqwest::Client,
}

impl ChromeLauncher {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    async fn launch_local(&self) -> Result<(Browser, JoinHandle<()>), DriverError> {
        tracing::info!(headless = self.settings.headless, "launching browser");

        let mut builder = BrowserConfig::builder();
        if let Some(path) = &self.settings.executable {
            builder = builder.chrome_executable(path);
        }
        if !self.settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .build()
            .map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        let task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok((browser, task))
    }

    async fn connect_remote(
        &self,
        remote_url: &str,
    ) -> Result<(Browser, JoinHandle<()>), DriverError> {
        tracing::info!(remote_url, "connecting to remote browser");
        let ws_url = discover_ws_url(&self.http, remote_url).await?;

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        let task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok((browser, task))
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn Driver>, DriverError> {
        let remote = self.settings.remote_url.is_some();
        let (browser, handler_task) = match &self.settings.remote_url {
            Some(url) => self.connect_remote(url).await?,
            None => self.launch_local().await?,
        };

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        page.execute(SetUserAgentOverrideParams::new(
            self.settings.user_agent.clone(),
        ))
        .await
        .map_err(|e| DriverError::Protocol(e.to_string()))?;

        Ok(Box::new(ChromeDriver {
            browser: Mutex::new(browser),
            page,
            handler_task,
            remote,
            navigation_timeout: Duration::from_secs(self.settings.navigation_timeout_secs),
        }))
    }
}

/// Resolve the browser-level WebSocket URL of a remote DevTools endpoint.
///
/// Accepts `http(s)://` or `ws(s)://` forms of the endpoint.
///
/// # Errors
///
/// Returns [`DriverError::Discovery`] if the endpoint is unreachable or its
/// `/json/version` document lacks `webSocketDebuggerUrl`.
pub async fn discover_ws_url(
    client: &reqwest::Client,
    remote_url: &str,
) -> Result<String, DriverError> {
    let http_url = remote_url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

    let discovery_err = |reason: String| DriverError::Discovery {
        url: version_url.clone(),
        reason,
    };

    let response = client
        .get(&version_url)
        .send()
        .await
        .map_err(|e| discovery_err(e.to_string()))?;
    if !response.status().is_success() {
        return Err(discovery_err(format!("HTTP {}", response.status().as_u16())));
    }
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| discovery_err(e.to_string()))?;

    body.get("webSocketDebuggerUrl")
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| discovery_err("no webSocketDebuggerUrl in response".to_string()))
}

struct ChromeDriver {
    browser: Mutex<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    remote: bool,
    navigation_timeout: Duration,
}

fn protocol(e: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(e.to_string())
}

#[async_trait]
impl Driver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        tracing::debug!(url, "navigating");
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DriverError::Timeout {
                what: format!("navigation to {url}"),
                timeout_ms: duration_ms(self.navigation_timeout),
            }),
        }
    }

    async fn wait_for_navigation(&self, bound: Duration) -> Result<bool, DriverError> {
        match tokio::time::timeout(bound, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => Err(protocol(e)),
            Err(_) => Ok(false),
        }
    }

    async fn wait_for_selector(&self, selector: &str, bound: Duration) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + bound;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    what: format!("selector {selector}"),
                    timeout_ms: duration_ms(bound),
                });
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        element.focus().await.map_err(protocol)?;
        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(protocol)?;
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        element.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, DriverError> {
        self.page.content().await.map_err(protocol)
    }

    async fn close(&self) -> Result<(), DriverError> {
        let page_result = self.page.clone().close().await.map_err(protocol);
        if !self.remote {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                tracing::warn!(error = %e, "browser close failed");
            }
            if let Err(e) = browser.wait().await {
                tracing::warn!(error = %e, "browser process did not exit cleanly");
            }
        }
        self.handler_task.abort();
        page_result
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
