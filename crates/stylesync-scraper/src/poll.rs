//! Bounded waiting over the live page.

use std::time::Duration;

use scraper::Html;

use crate::driver::Driver;

/// Every wait bound the pipeline uses.
///
/// Production code uses [`Timings::default`]; tests shrink the bounds so a
/// scripted page that never becomes ready fails in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Interval between predicate evaluations for list and detail waits.
    pub poll_interval: Duration,
    /// Interval for the plain table captures.
    pub table_poll_interval: Duration,
    /// Upper bound for "submit + settle" after posting the login form.
    pub login_settle: Duration,
    /// Per-keystroke delay while typing credentials.
    pub keystroke_delay: Duration,
    /// Settle race after triggering "show all".
    pub show_all_settle: Duration,
    /// Quick check for rows before reloading the list once more.
    pub quick_rows: Duration,
    /// Rows must appear within this after a season search click.
    pub search_rows: Duration,
    /// Spacing between search click retries.
    pub search_retry_spacing: Duration,
    /// Final wait for catalog rows.
    pub list_rows: Duration,
    /// Wait for the materials size table.
    pub detail_table: Duration,
    /// Wait for at least one stat & stock box.
    pub stat_boxes: Duration,
    /// Wait for a details region after clicking a box toggle.
    pub expansion: Duration,
    /// Wait for a plain listing table.
    pub table: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(300),
            table_poll_interval: Duration::from_secs(2),
            login_settle: Duration::from_secs(30),
            keystroke_delay: Duration::from_millis(10),
            show_all_settle: Duration::from_millis(1500),
            quick_rows: Duration::from_secs(3),
            search_rows: Duration::from_secs(6),
            search_retry_spacing: Duration::from_secs(2),
            list_rows: Duration::from_secs(45),
            detail_table: Duration::from_secs(45),
            stat_boxes: Duration::from_secs(30),
            expansion: Duration::from_secs(3),
            table: Duration::from_secs(30),
        }
    }
}

impl Timings {
    /// Tight bounds for tests against scripted pages.
    #[must_use]
    pub fn instant() -> Self {
        let tick = Duration::from_millis(1);
        Self {
            poll_interval: tick,
            table_poll_interval: tick,
            login_settle: Duration::from_millis(20),
            keystroke_delay: Duration::ZERO,
            show_all_settle: tick,
            quick_rows: Duration::from_millis(5),
            search_rows: Duration::from_millis(5),
            search_retry_spacing: tick,
            list_rows: Duration::from_millis(20),
            detail_table: Duration::from_millis(20),
            stat_boxes: Duration::from_millis(20),
            expansion: Duration::from_millis(5),
            table: Duration::from_millis(20),
        }
    }
}

/// Re-read the page until `predicate` holds or `bound` elapses.
///
/// The predicate is evaluated at least once. A failed page read counts as
/// "not yet" rather than an error. Returns `false` on timeout.
pub async fn poll_until<P>(
    driver: &dyn Driver,
    bound: Duration,
    interval: Duration,
    mut predicate: P,
) -> bool
where
    P: FnMut(&Html) -> bool + Send,
{
    let deadline = tokio::time::Instant::now() + bound;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match driver.content().await {
            Ok(html) => {
                if check(&html, &mut predicate) {
                    tracing::debug!(attempt, "poll satisfied");
                    return true;
                }
            }
            Err(e) => tracing::debug!(attempt, error = %e, "page read failed while polling"),
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::debug!(attempt, "poll timed out");
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

fn check<P>(html: &str, predicate: &mut P) -> bool
where
    P: FnMut(&Html) -> bool,
{
    let doc = Html::parse_document(html);
    predicate(&doc)
}
