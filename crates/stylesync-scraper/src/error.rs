use thiserror::Error;

/// Failure reported by the browser automation layer.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("remote browser discovery failed at {url}: {reason}")]
    Discovery { url: String, reason: String },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing SPY_USER or SPY_PASS")]
    MissingCredentials,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("Style list table not loaded within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("season \"{season}\" not found among {available} options")]
    SeasonNotFound { season: String, available: usize },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Per-item failure. Reported on the item's event; the job carries on.
#[derive(Debug, Error)]
pub enum DetailError {
    #[error("{what} not found on {url}")]
    NotFound { what: String, url: String },

    #[error("no variant boxes appeared on {url} within {timeout_ms}ms")]
    ExpansionTimeout { url: String, timeout_ms: u64 },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Job-level failure. Aborts the run with the logs gathered so far.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    List(#[from] ListError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}
