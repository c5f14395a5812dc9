//! Command handlers for the CLI.
//!
//! `run` streams NDJSON events to stdout as the job produces them, or prints
//! the buffered report once at the end. Either way a failed job exits non-zero
//! after its output has been written.

use std::io::Write;

use stylesync_core::{AppConfig, JobMode, JobRequest, LinkInput};
use stylesync_scraper::session::{at_login, ensure_authenticated, require_credentials};
use stylesync_scraper::{
    run_job, BufferedSink, ChromeLauncher, JobSettings, Launcher, Reporter, WriterSink,
};

pub(crate) fn build_request(
    mode: JobMode,
    links: Vec<String>,
    limit: Option<i64>,
    season: Option<String>,
    skip_details: bool,
) -> JobRequest {
    JobRequest {
        mode,
        links: links
            .into_iter()
            .map(|href| LinkInput {
                href,
                ..LinkInput::default()
            })
            .collect(),
        limit,
        skip_details,
        season_text: season,
    }
}

/// Run one job against the configured back office.
///
/// # Errors
///
/// Returns an error if the job failed; its output has already been written.
pub(crate) async fn run_extraction(
    config: &AppConfig,
    request: &JobRequest,
    buffered: bool,
) -> anyhow::Result<()> {
    let launcher = ChromeLauncher::new(config.browser.clone());
    let settings = JobSettings::from_config(config);

    if buffered {
        let mut sink = BufferedSink::new();
        let outcome = run_job(&launcher, &settings, request, &mut sink).await;
        let report = sink.into_report();
        let mut stdout = std::io::stdout();
        serde_json::to_writer_pretty(&mut stdout, &report)?;
        writeln!(stdout)?;
        outcome?;
    } else {
        let mut sink = WriterSink::new(std::io::stdout());
        run_job(&launcher, &settings, request, &mut sink).await?;
    }
    Ok(())
}

/// Launch a browser, log in and report whether the session stuck.
///
/// # Errors
///
/// Returns an error if credentials are missing, the browser cannot be
/// launched, or the login form is still shown after submitting.
pub(crate) async fn run_login(config: &AppConfig) -> anyhow::Result<()> {
    let credentials = require_credentials(config.credentials.as_ref())?;
    let settings = JobSettings::from_config(config);
    let driver = ChromeLauncher::new(config.browser.clone()).launch().await?;

    let mut sink = WriterSink::new(std::io::stderr());
    let mut reporter = Reporter::new(&mut sink);
    let attempt = ensure_authenticated(
        driver.as_ref(),
        &settings.base_url,
        credentials,
        &settings.timings,
        &mut reporter,
    )
    .await;
    let still_at_login = match attempt {
        Ok(()) => at_login(driver.as_ref()).await.map_err(anyhow::Error::from),
        Err(e) => Err(e.into()),
    };

    if let Err(e) = driver.close().await {
        tracing::warn!(error = %e, "failed to close browser");
    }

    if still_at_login? {
        anyhow::bail!(
            "login form still shown for {}; check SPY_USER / SPY_PASS",
            credentials.username
        );
    }
    println!("logged in to {} as {}", settings.base_url, credentials.username);
    Ok(())
}
