//! Catalog list acquisition.
//!
//! Both strategies walk the same states, Navigated → Triggered → Settled →
//! Verified. Each transition is bounded and logged; only the final row wait
//! (or an unknown season) fails the job.

use std::fmt;

use scraper::{ElementRef, Html};
use stylesync_core::CatalogItem;

use crate::driver::Driver;
use crate::error::ListError;
use crate::events::Reporter;
use crate::list_parse::{has_list_rows, list_row_count, parse_catalog_rows};
use crate::parse_helpers::{attr, exists, select_all, text_of};
use crate::poll::{poll_until, Timings};
use crate::session::at_login;

const SHOW_ALL_NAMED: &str = r#"button[name="show_all"], input[name="show_all"]"#;
const SHOW_ALL_TEXT_CANDIDATES: &str = r#"button, input[type="button"], a"#;
const SEARCH_NAMED: &str = r#"button[name="search"], input[name="search"]"#;
const SEARCH_BUTTON_CANDIDATES: &str = r#"button, input[type="submit"], input[type="button"]"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListStrategy {
    /// Unfiltered listing with every row shown.
    ShowAll,
    /// Listing filtered by the season whose option text matches.
    SearchBySeason(String),
}

impl fmt::Display for ListStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShowAll => f.write_str("show all"),
            Self::SearchBySeason(season) => write!(f, "search by season \"{season}\""),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListState {
    Navigated,
    Triggered,
    Settled,
    Verified,
}

impl fmt::Display for ListState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Navigated => "Navigated",
            Self::Triggered => "Triggered",
            Self::Settled => "Settled",
            Self::Verified => "Verified",
        };
        f.write_str(name)
    }
}

#[must_use]
pub fn list_url(base_url: &str) -> String {
    format!("{base_url}/?controller=Style%5CIndex&action=List")
}

#[must_use]
pub fn show_all_url(base_url: &str) -> String {
    format!("{}&show_all=1", list_url(base_url))
}

/// Direct navigation that submits the season filter without the form.
#[must_use]
pub fn forced_search_url(base_url: &str, field: &str, value: &str) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair(field, value);
    query.append_pair("search", "1");
    format!("{}&{}", list_url(base_url), query.finish())
}

fn is_canonical_list(url: &str) -> bool {
    url.contains("controller=Style%5CIndex") && url.contains("action=List")
}

/// Script that clicks the `index`-th element matching `css`.
fn click_nth_script(purpose: &str, css: &str, index: usize) -> String {
    let css = serde_json::Value::String(css.to_string());
    format!(
        "/* {purpose} */ (() => {{ const el = document.querySelectorAll({css})[{index}]; \
         if (!el) return false; el.click(); return true; }})()"
    )
}

/// Script that selects option `option` of the `select`-th select element.
fn select_option_script(select: usize, option: usize) -> String {
    format!(
        "/* select season */ (() => {{ const s = document.querySelectorAll('select')[{select}]; \
         if (!s) return null; s.selectedIndex = {option}; \
         s.dispatchEvent(new Event('change', {{ bubbles: true }})); return s.value; }})()"
    )
}

/// Text a control shows: `value` for inputs, text content otherwise.
fn control_label(el: ElementRef<'_>) -> String {
    if el.value().name() == "input" {
        attr(el, "value").unwrap_or_default()
    } else {
        text_of(el)
    }
}

fn find_by_label(doc: &Html, css: &str, label: &str) -> Option<usize> {
    select_all(doc.root_element(), css)
        .into_iter()
        .position(|el| control_label(el).trim().eq_ignore_ascii_case(label))
}

/// The season `<select>` option chosen for a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeasonOption {
    pub select_index: usize,
    pub option_index: usize,
    pub field: String,
    pub value: String,
}

/// Resolve `season` by case-insensitive exact option text across all selects.
pub(crate) fn find_season_option(doc: &Html, season: &str) -> Result<SeasonOption, usize> {
    let selects = select_all(doc.root_element(), "select");
    let mut available = 0;
    for (select_index, select) in selects.iter().enumerate() {
        let options = select_all(*select, "option");
        available += options.len();
        if let Some(option_index) = options
            .iter()
            .position(|o| text_of(*o).eq_ignore_ascii_case(season.trim()))
        {
            let option = options[option_index];
            return Ok(SeasonOption {
                select_index,
                option_index,
                field: attr(*select, "name").unwrap_or_else(|| "season".to_string()),
                value: attr(option, "value").unwrap_or_default(),
            });
        }
    }
    Err(available)
}

/// How the search control was found.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SearchControl {
    Named,
    Button(usize),
    Link(usize),
}

fn find_search_control(doc: &Html) -> Option<SearchControl> {
    if exists(doc, SEARCH_NAMED) {
        return Some(SearchControl::Named);
    }
    if let Some(i) = find_by_label(doc, SEARCH_BUTTON_CANDIDATES, "search") {
        return Some(SearchControl::Button(i));
    }
    find_by_label(doc, "a", "search").map(SearchControl::Link)
}

async fn read_doc<T>(driver: &dyn Driver, f: impl FnOnce(&Html) -> T) -> Result<T, ListError> {
    let html = driver.content().await?;
    let doc = Html::parse_document(&html);
    Ok(f(&doc))
}

/// Enumerate catalog items with the given strategy.
///
/// # Errors
///
/// Returns [`ListError::Timeout`] if rows never appear,
/// [`ListError::SeasonNotFound`] if no option matches the season, and
/// [`ListError::Driver`] if a required navigation fails.
pub async fn list_items(
    driver: &dyn Driver,
    base_url: &str,
    strategy: &ListStrategy,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) -> Result<Vec<CatalogItem>, ListError> {
    reporter.log(format!("STEP: Listing styles ({strategy})"));
    let mut state = ListState::Navigated;
    let mut season_option: Option<SeasonOption> = None;

    let entry_url = match strategy {
        ListStrategy::ShowAll => show_all_url(base_url),
        ListStrategy::SearchBySeason(_) => list_url(base_url),
    };
    driver.navigate(&entry_url).await?;
    reporter.log(format!("STEP: On list url={}", driver.current_url().await?));
    if at_login(driver).await? {
        reporter.log("STEP: Detected login page when opening list");
    }

    loop {
        let next = match state {
            ListState::Navigated => {
                match strategy {
                    ListStrategy::ShowAll => trigger_show_all(driver, reporter).await?,
                    ListStrategy::SearchBySeason(season) => {
                        let option = select_season(driver, season, reporter).await?;
                        click_search(driver, reporter).await?;
                        if !option.value.is_empty() {
                            let forced = forced_search_url(base_url, &option.field, &option.value);
                            reporter.log(format!("STEP: Forcing search navigation {forced}"));
                            driver.navigate(&forced).await?;
                        }
                        season_option = Some(option);
                    }
                }
                ListState::Triggered
            }
            ListState::Triggered => {
                match strategy {
                    ListStrategy::ShowAll => {
                        settle_show_all(driver, base_url, timings, reporter).await?;
                    }
                    ListStrategy::SearchBySeason(season) => {
                        let option = season_option.as_ref();
                        settle_search(driver, base_url, season, option, timings, reporter).await?;
                    }
                }
                ListState::Settled
            }
            ListState::Settled => {
                reporter.log("STEP: Waiting for list rows");
                let found =
                    poll_until(driver, timings.list_rows, timings.poll_interval, has_list_rows)
                        .await;
                if !found {
                    let bound = timings.list_rows.as_millis();
                    return Err(ListError::Timeout {
                        timeout_ms: u64::try_from(bound).unwrap_or(u64::MAX),
                    });
                }
                ListState::Verified
            }
            ListState::Verified => break,
        };
        reporter.log(format!("STEP: List state {state} -> {next}"));
        state = next;
    }

    let page_url = driver.current_url().await?;
    let html = driver.content().await?;
    let items = parse_catalog_rows(&html, &page_url, base_url);
    reporter.log(format!("STEP: Found {} list rows with style links", items.len()));
    if !items.is_empty() {
        let heads: Vec<&str> = items.iter().take(5).map(|i| i.style_no.as_str()).collect();
        reporter.log(format!("STEP: First styles: {}", heads.join(", ")));
    }
    Ok(items)
}

async fn trigger_show_all(
    driver: &dyn Driver,
    reporter: &mut Reporter<'_>,
) -> Result<(), ListError> {
    reporter.log("STEP: Triggering Show All");
    let by_text = read_doc(driver, |doc| {
        if exists(doc, SHOW_ALL_NAMED) {
            None
        } else {
            Some(find_by_label(doc, SHOW_ALL_TEXT_CANDIDATES, "show all"))
        }
    })
    .await?;

    match by_text {
        None => {
            if let Err(e) = driver.click(SHOW_ALL_NAMED).await {
                reporter.log(format!("STEP: Show All click error: {e}"));
            }
        }
        Some(Some(index)) => {
            let script = click_nth_script("click show all", SHOW_ALL_TEXT_CANDIDATES, index);
            if let Err(e) = driver.evaluate(&script).await {
                reporter.log(format!("STEP: Show All click error: {e}"));
            }
        }
        Some(None) => reporter.log("STEP: No Show All control found"),
    }
    Ok(())
}

async fn settle_show_all(
    driver: &dyn Driver,
    base_url: &str,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) -> Result<(), ListError> {
    match driver.wait_for_navigation(timings.show_all_settle).await {
        Ok(true) => reporter.log("STEP: Show All caused a navigation"),
        Ok(false) => {}
        Err(e) => reporter.log(format!("STEP: Navigation wait failed: {e}")),
    }
    let url = driver.current_url().await?;
    reporter.log(format!("STEP: After Show All trigger, url={url}"));

    if !is_canonical_list(&url) {
        reporter.log(
            "STEP: Not on list after Show All, forcing navigation back to list with show_all=1",
        );
        driver.navigate(&show_all_url(base_url)).await?;
        reporter.log(format!("STEP: Forced list url={}", driver.current_url().await?));
    }

    let quick = poll_until(driver, timings.quick_rows, timings.poll_interval, has_list_rows).await;
    if !quick {
        reporter.log("STEP: Quick Show All failed, reloading list with show_all=1");
        if let Err(e) = driver.navigate(&show_all_url(base_url)).await {
            reporter.log(format!("STEP: Reload failed: {e}"));
        }
    }
    Ok(())
}

async fn select_season(
    driver: &dyn Driver,
    season: &str,
    reporter: &mut Reporter<'_>,
) -> Result<SeasonOption, ListError> {
    reporter.log(format!("STEP: Selecting season \"{season}\""));
    let found = read_doc(driver, |doc| find_season_option(doc, season)).await?;
    let option = found.map_err(|available| ListError::SeasonNotFound {
        season: season.to_string(),
        available,
    })?;

    let script = select_option_script(option.select_index, option.option_index);
    match driver.evaluate(&script).await {
        Ok(serde_json::Value::String(v)) if v != option.value => {
            reporter.log(format!("STEP: Browser reports selectedValue='{v}'"));
        }
        Ok(_) => {}
        Err(e) => reporter.log(format!("STEP: Season select error: {e}")),
    }
    reporter.log(format!("STEP: Season option selectedValue='{}'", option.value));
    Ok(option)
}

async fn click_search(driver: &dyn Driver, reporter: &mut Reporter<'_>) -> Result<bool, ListError> {
    let control = read_doc(driver, find_search_control).await?;
    let outcome = match &control {
        Some(SearchControl::Named) => driver.click(SEARCH_NAMED).await.map(|()| true),
        Some(SearchControl::Button(i)) => driver
            .evaluate(&click_nth_script("click search", SEARCH_BUTTON_CANDIDATES, *i))
            .await
            .map(|_| true),
        Some(SearchControl::Link(i)) => driver
            .evaluate(&click_nth_script("click search", "a", *i))
            .await
            .map(|_| true),
        None => Ok(false),
    };
    match outcome {
        Ok(true) => {
            reporter.log(format!("STEP: Clicked search control ({control:?})"));
            Ok(true)
        }
        Ok(false) => {
            reporter.log("STEP: No search control found");
            Ok(false)
        }
        Err(e) => {
            reporter.log(format!("STEP: Search click error: {e}"));
            Ok(false)
        }
    }
}

async fn settle_search(
    driver: &dyn Driver,
    base_url: &str,
    season: &str,
    option: Option<&SeasonOption>,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) -> Result<(), ListError> {
    if poll_until(driver, timings.search_rows, timings.poll_interval, has_list_rows).await {
        return Ok(());
    }

    for attempt in 1..=2 {
        reporter.log(format!("STEP: Rows not visible, retrying search ({attempt}/2)"));
        tokio::time::sleep(timings.search_retry_spacing).await;
        if !is_canonical_list(&driver.current_url().await?) {
            driver.navigate(&list_url(base_url)).await?;
        }
        if let Err(e) = select_season(driver, season, reporter).await {
            reporter.log(format!("STEP: Season re-select failed: {e}"));
        }
        click_search(driver, reporter).await?;
        if poll_until(driver, timings.search_rows, timings.poll_interval, has_list_rows).await {
            return Ok(());
        }
    }

    if let Some(option) = option.filter(|o| !o.value.is_empty()) {
        let forced = forced_search_url(base_url, &option.field, &option.value);
        reporter.log(format!("STEP: Falling back to parameterized search {forced}"));
        driver.navigate(&forced).await?;
    }
    let rows = read_doc(driver, list_row_count).await?;
    reporter.log(format!("STEP: Rows after search fallback = {rows}"));
    Ok(())
}

#[cfg(test)]
#[path = "list_test.rs"]
mod tests;
