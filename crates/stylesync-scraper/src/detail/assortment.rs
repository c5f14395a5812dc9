//! Size matrix and named assortments from the materials tab.

use scraper::Html;
use stylesync_core::{AssortmentDetail, AssortmentRow};

use crate::driver::Driver;
use crate::error::{DetailError, DriverError};
use crate::events::Reporter;
use crate::parse_helpers::{
    body_rows_of, parse_quantity, row_cells, select_all, select_first, text_input_value, text_of,
};
use crate::poll::{poll_until, Timings};

const MATERIALS_TAB_CELL: &str = r#"td[data-tab-name="materials"]"#;
const MATERIALS_TAB_ANY: &str = r#"[data-tab-name="materials"]"#;
const SIZE_TABLE: &str =
    r#".pagesTab[data-tab-name="materials"] .pagesMiddle[name="Style No."] table.standardList"#;

fn size_table_ready(doc: &Html) -> bool {
    select_first(doc.root_element(), SIZE_TABLE).is_some_and(|t| !body_rows_of(t).is_empty())
}

fn is_size_column_end(label: &str) -> bool {
    let lower = label.to_lowercase();
    lower.is_empty() || lower == "total" || lower == "min qty" || lower == "min qty."
}

/// Parse the materials size table. `None` when the table is absent.
#[must_use]
pub fn parse_assortments(html: &str) -> Option<AssortmentDetail> {
    let doc = Html::parse_document(html);
    let table = select_first(doc.root_element(), SIZE_TABLE)?;

    let headers: Vec<String> = select_all(table, "thead th").into_iter().map(text_of).collect();
    let sizes: Vec<String> = headers
        .iter()
        .skip(1)
        .take_while(|h| !is_size_column_end(h))
        .cloned()
        .collect();
    let width = sizes.len();

    let mut detail = AssortmentDetail {
        sizes,
        headers,
        ..AssortmentDetail::default()
    };

    for tr in body_rows_of(table) {
        let cells = row_cells(tr);
        let Some(first) = cells.first().copied() else {
            continue;
        };
        let label = text_input_value(first)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| text_of(first));
        let active = select_first(first, r#"input[type="checkbox"]"#)
            .is_some_and(|cb| cb.value().attr("checked").is_some());

        let value_of = |i: usize| {
            cells.get(i).map_or(0.0, |td| {
                parse_quantity(&text_input_value(*td).unwrap_or_else(|| text_of(*td)))
            })
        };
        let per_size: Vec<f64> = (1..=width).map(value_of).collect();
        let total = cells
            .get(width + 1)
            .map_or(0.0, |td| parse_quantity(&text_of(*td)));
        let min_qty = value_of(width + 2);

        if label.eq_ignore_ascii_case("free") {
            detail.free = Some(per_size);
        } else if !label.is_empty() {
            detail.assortments.push(AssortmentRow {
                label,
                active,
                per_size,
                total,
                min_qty,
            });
        }
    }
    Some(detail)
}

/// Open the item, switch to the materials tab and read its size table.
///
/// # Errors
///
/// Returns [`DetailError::NotFound`] if the size table never appears and
/// [`DetailError::Driver`] if the item page cannot be opened.
pub async fn extract_assortments(
    driver: &dyn Driver,
    item_url: &str,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) -> Result<AssortmentDetail, DetailError> {
    reporter.log(format!("STEP: Opening style detail {item_url}"));
    driver.navigate(item_url).await?;

    reporter.log("STEP: Clicking materials tab");
    match driver.click(MATERIALS_TAB_CELL).await {
        Ok(()) => {}
        Err(DriverError::ElementNotFound { .. }) => {
            if let Err(e) = driver.click(MATERIALS_TAB_ANY).await {
                reporter.log(format!("STEP: Materials tab not clickable: {e}"));
            }
        }
        Err(e) => reporter.log(format!("STEP: Materials tab click error: {e}")),
    }

    reporter.log("STEP: Waiting for size table on detail page");
    let ready =
        poll_until(driver, timings.detail_table, timings.poll_interval, size_table_ready).await;
    if !ready {
        return Err(DetailError::NotFound {
            what: "Size table".to_string(),
            url: item_url.to_string(),
        });
    }

    let html = driver.content().await?;
    let detail = parse_assortments(&html).ok_or_else(|| DetailError::NotFound {
        what: "Size table".to_string(),
        url: item_url.to_string(),
    })?;
    reporter.log(format!("STEP: Detail headers: {}", detail.headers.join(", ")));
    reporter.log(format!(
        "STEP: Parsed {} assortments over {} sizes (free row {})",
        detail.assortments.len(),
        detail.sizes.len(),
        if detail.free.is_some() { "present" } else { "absent" }
    ));
    Ok(detail)
}
