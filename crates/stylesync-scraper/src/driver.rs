//! The browser capability the extraction pipeline is written against.
//!
//! Everything above this seam reads the page through [`Driver::content`] and
//! parses the serialized DOM, so pipeline tests run against a scripted
//! in-memory driver instead of a real browser.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate and wait for DOM-content-loaded.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Wait for an in-flight navigation to settle. Returns `false` if none
    /// completed within `bound`.
    async fn wait_for_navigation(&self, bound: Duration) -> Result<bool, DriverError>;

    /// Wait until `selector` matches an element.
    async fn wait_for_selector(&self, selector: &str, bound: Duration) -> Result<(), DriverError>;

    /// Evaluate a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Type `text` into the first element matching `selector`, pausing
    /// `delay` between keystrokes.
    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// Produces one fresh browser context per job.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Driver>, DriverError>;
}
