//! Session assurance: make sure the browser context is logged in before any
//! scrape step runs.

use stylesync_core::Credentials;

use crate::driver::Driver;
use crate::error::{AuthError, DriverError};
use crate::events::Reporter;
use crate::parse_helpers::exists;
use crate::poll::Timings;

/// Present only while the login form is displayed.
pub const LOGIN_MARKER: &str = r#"input[name="username"], form[action*="SignIn"]"#;
const USERNAME_FIELD: &str = r#"input[name="username"]"#;
const PASSWORD_FIELD: &str = r#"input[name="password"]"#;
const SUBMIT: &str = r#"button[type="submit"], input[type="submit"]"#;

#[must_use]
pub fn login_url(base_url: &str) -> String {
    format!("{base_url}/?controller=Index&action=GetLoginPage")
}

/// Fail fast when configuration carries no login.
///
/// # Errors
///
/// Returns [`AuthError::MissingCredentials`] when `credentials` is `None`.
pub fn require_credentials(credentials: Option<&Credentials>) -> Result<&Credentials, AuthError> {
    credentials.ok_or(AuthError::MissingCredentials)
}

/// Whether the login form is on the current page.
///
/// # Errors
///
/// Returns [`DriverError`] if the page cannot be read.
pub async fn at_login(driver: &dyn Driver) -> Result<bool, DriverError> {
    let html = driver.content().await?;
    Ok(page_shows_login(&html))
}

fn page_shows_login(html: &str) -> bool {
    exists(&scraper::Html::parse_document(html), LOGIN_MARKER)
}

/// Log in unless the session already is. Idempotent.
///
/// A login form still showing after submit is reported, not treated as an
/// error: later steps detect a bounced session on their own.
///
/// # Errors
///
/// Returns [`AuthError::Driver`] if the login page cannot be opened or read.
pub async fn ensure_authenticated(
    driver: &dyn Driver,
    base_url: &str,
    credentials: &Credentials,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) -> Result<(), AuthError> {
    reporter.log("STEP: Ensuring logged in");
    driver.navigate(&login_url(base_url)).await?;

    if !at_login(driver).await? {
        reporter.log("STEP: Session already authenticated");
        return Ok(());
    }

    reporter.log("STEP: Typing credentials");
    if let Err(e) = driver
        .wait_for_selector(USERNAME_FIELD, timings.login_settle)
        .await
    {
        reporter.log(format!("STEP: Username field not ready: {e}"));
    }
    if let Err(e) = driver
        .type_text(USERNAME_FIELD, &credentials.username, timings.keystroke_delay)
        .await
    {
        reporter.log(format!("STEP: Username field not typed: {e}"));
    }
    if let Err(e) = driver
        .type_text(PASSWORD_FIELD, &credentials.password, timings.keystroke_delay)
        .await
    {
        reporter.log(format!("STEP: Password field not typed: {e}"));
    }

    reporter.log("STEP: Submitting login form");
    let settle = timings.login_settle;
    let submitted = tokio::time::timeout(settle, async {
        let clicked = driver.click(SUBMIT).await;
        let navigated = driver.wait_for_navigation(settle).await;
        (clicked, navigated)
    })
    .await;
    match submitted {
        Ok((Err(e), _)) => reporter.log(format!("STEP: Submit click failed: {e}")),
        Ok((Ok(()), Ok(false))) => reporter.log("STEP: No navigation after submit"),
        Ok((Ok(()), Err(e))) => reporter.log(format!("STEP: Navigation wait failed: {e}")),
        Ok((Ok(()), Ok(true))) => {}
        Err(_) => reporter.log(format!(
            "STEP: Login settle bound of {}ms reached",
            settle.as_millis()
        )),
    }

    let still_login = at_login(driver).await?;
    reporter.log(format!("STEP: Login page present after submit = {still_login}"));
    if still_login {
        tracing::warn!(base_url, "login form still present after submit");
    }
    Ok(())
}
