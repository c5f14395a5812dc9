//! Collapsed stat & stock matrices, one [`StockBox`] per colour.

use scraper::Html;
use stylesync_core::StockBox;

use super::stat_view::{open_stat_view, parse_collapsed_box, stat_boxes};
use crate::driver::Driver;
use crate::error::DetailError;
use crate::events::Reporter;
use crate::poll::Timings;

/// Parse every stat & stock box on the page.
#[must_use]
pub fn parse_stock_boxes(html: &str) -> Vec<StockBox> {
    let doc = Html::parse_document(html);
    stat_boxes(&doc)
        .into_iter()
        .map(|b| {
            let collapsed = parse_collapsed_box(b);
            StockBox {
                delivered: collapsed.pick("delivered"),
                stock: collapsed.pick("stock"),
                available: collapsed.pick("available"),
                po: collapsed.pick("po (running + shipped)"),
                sold_stock: collapsed.pick("sold stock"),
                sold_pre: collapsed.pick("sold pre"),
                color_name: collapsed.color_name,
                sizes: collapsed.sizes,
            }
        })
        .collect()
}

/// Open the item's stat & stock view and read its collapsed matrices.
///
/// # Errors
///
/// Returns [`DetailError::NotFound`] when no box appears and
/// [`DetailError::Driver`] if the page cannot be opened.
pub async fn extract_stock_matrix(
    driver: &dyn Driver,
    item_url: &str,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) -> Result<Vec<StockBox>, DetailError> {
    if !open_stat_view(driver, item_url, timings, reporter).await? {
        return Err(DetailError::NotFound {
            what: "statAndStockBox".to_string(),
            url: item_url.to_string(),
        });
    }

    reporter.log("STEP: Parsing stock matrices");
    let html = driver.content().await?;
    let boxes = parse_stock_boxes(&html);
    if boxes.is_empty() {
        return Err(DetailError::NotFound {
            what: "statAndStockBox".to_string(),
            url: item_url.to_string(),
        });
    }
    reporter.log(format!("STEP: Parsed {} stock boxes", boxes.len()));
    Ok(boxes)
}
