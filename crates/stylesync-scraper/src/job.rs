//! Job orchestration: authenticate, enumerate, extract per item, report.
//!
//! A job owns one browser context from launch to close. Items are processed
//! strictly in list order; a failed item becomes a failed event and the job
//! carries on, while a failed login or listing aborts it. `done` is emitted
//! on every path, after the browser has been closed.

use std::time::Duration;

use stylesync_core::{AppConfig, CatalogItem, Credentials, JobMode, JobRequest};

use crate::detail::{extract_assortments, extract_expanded_free, extract_stock_matrix};
use crate::driver::{Driver, Launcher};
use crate::error::{DetailError, JobError};
use crate::events::{
    DoneEvent, EventSink, ExtractionEvent, ItemOutcome, ItemRef, Reporter, RowEvent,
};
use crate::list::{list_items, ListStrategy};
use crate::poll::Timings;
use crate::session::{ensure_authenticated, require_credentials};
use crate::table::{capture_table, purchases_url, PURCHASES_TABLE, STOCK_PRE_TABLE};

/// What a job needs from configuration.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub timings: Timings,
}

impl JobSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials.clone(),
            timings: Timings {
                login_settle: Duration::from_secs(config.login_settle_timeout_secs),
                ..Timings::default()
            },
        }
    }
}

/// Run one job to completion, delivering every event to `sink`.
///
/// The terminal `done` event carries the outcome; the same outcome is
/// returned so callers can pick an exit status.
///
/// # Errors
///
/// Returns [`JobError`] when authentication, listing or the browser itself
/// fails. Per-item failures are reported on their events only.
pub async fn run_job(
    launcher: &dyn Launcher,
    settings: &JobSettings,
    request: &JobRequest,
    sink: &mut dyn EventSink,
) -> Result<(), JobError> {
    let mut reporter = Reporter::new(sink);
    reporter.log(format!("BEGIN {} job", request.mode));

    let outcome = execute(launcher, settings, request, &mut reporter).await;

    let done = match &outcome {
        Ok(()) => {
            reporter.log("END ok");
            DoneEvent { ok: true, error: None }
        }
        Err(e) => {
            tracing::error!(error = %e, mode = %request.mode, "job failed");
            reporter.log(format!("ERROR: {e}"));
            DoneEvent {
                ok: false,
                error: Some(e.to_string()),
            }
        }
    };
    reporter.emit(ExtractionEvent::Done(done));
    outcome
}

async fn execute(
    launcher: &dyn Launcher,
    settings: &JobSettings,
    request: &JobRequest,
    reporter: &mut Reporter<'_>,
) -> Result<(), JobError> {
    let credentials = require_credentials(settings.credentials.as_ref())?;

    reporter.log("STEP: Launching browser");
    let driver = launcher.launch().await?;

    let result = drive(driver.as_ref(), credentials, settings, request, reporter).await;

    if let Err(e) = driver.close().await {
        tracing::warn!(error = %e, "failed to close browser");
    }
    reporter.log("STEP: Browser closed");
    result
}

async fn drive(
    driver: &dyn Driver,
    credentials: &Credentials,
    settings: &JobSettings,
    request: &JobRequest,
    reporter: &mut Reporter<'_>,
) -> Result<(), JobError> {
    let base_url = settings.base_url.as_str();
    let timings = &settings.timings;
    ensure_authenticated(driver, base_url, credentials, timings, reporter).await?;

    if request.mode == JobMode::Purchases {
        let url = purchases_url(base_url);
        let result = capture_table(driver, &url, PURCHASES_TABLE, timings, reporter).await;
        let item = ItemRef {
            url,
            ..ItemRef::default()
        };
        let captured = outcome(reporter, 0, item, result);
        reporter.emit(ExtractionEvent::Table(captured));
        return Ok(());
    }

    let mut items = collect_items(driver, settings, request, reporter).await?;
    if let Some(limit) = request.effective_limit() {
        if items.len() > limit {
            reporter.log(format!("STEP: Limiting {} items to {limit}", items.len()));
            items.truncate(limit);
        }
    }

    let total = items.len();
    reporter.log(format!("STEP: Processing {total} items"));
    for (position, item) in items.iter().enumerate() {
        if request.skip_details {
            reporter.emit(ExtractionEvent::Row(RowEvent {
                ok: true,
                item: item.clone(),
            }));
            continue;
        }
        reporter.log(format!("STEP: [{}/{total}] {} {}", position + 1, item.style_no, item.href));
        let event = extract_item(driver, item, request.mode, timings, reporter).await;
        reporter.emit(event);
    }
    Ok(())
}

async fn collect_items(
    driver: &dyn Driver,
    settings: &JobSettings,
    request: &JobRequest,
    reporter: &mut Reporter<'_>,
) -> Result<Vec<CatalogItem>, JobError> {
    if !request.links.is_empty() {
        let items = request.resolve_links(&settings.base_url);
        reporter.log(format!(
            "STEP: Using {} provided links ({} given)",
            items.len(),
            request.links.len()
        ));
        return Ok(items);
    }

    let strategy = request
        .season()
        .map_or(ListStrategy::ShowAll, |season| ListStrategy::SearchBySeason(season.to_string()));
    Ok(list_items(driver, &settings.base_url, &strategy, &settings.timings, reporter).await?)
}

async fn extract_item(
    driver: &dyn Driver,
    item: &CatalogItem,
    mode: JobMode,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) -> ExtractionEvent {
    let index = item.index;
    let item_ref = ItemRef::from(item);
    match mode {
        JobMode::Detail => {
            let result = extract_assortments(driver, &item.href, timings, reporter).await;
            ExtractionEvent::Item(outcome(reporter, index, item_ref, result))
        }
        JobMode::Stock => {
            let result = extract_stock_matrix(driver, &item.href, timings, reporter).await;
            ExtractionEvent::Stock(outcome(reporter, index, item_ref, result))
        }
        JobMode::StatstockFree => {
            let result = extract_expanded_free(driver, &item.href, timings, reporter).await;
            ExtractionEvent::StatstockFree(outcome(reporter, index, item_ref, result))
        }
        // Purchases is captured once per job in `drive` and never gets here.
        JobMode::StockPre | JobMode::Purchases => {
            let result =
                capture_table(driver, &item.href, STOCK_PRE_TABLE, timings, reporter).await;
            ExtractionEvent::Table(outcome(reporter, index, item_ref, result))
        }
    }
}

fn outcome<T>(
    reporter: &mut Reporter<'_>,
    index: usize,
    item: ItemRef,
    result: Result<T, DetailError>,
) -> ItemOutcome<T> {
    if let Err(e) = &result {
        tracing::warn!(
            style_no = %item.style_no,
            url = %item.url,
            error = %e,
            "item extraction failed"
        );
        reporter.log(format!("ERROR: {} {e}", item.style_no));
    }
    ItemOutcome::from_result(index, item, result)
}

#[cfg(test)]
#[path = "job_test.rs"]
mod tests;
