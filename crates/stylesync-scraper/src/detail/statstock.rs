//! Expanded stat & stock reading with the purchase-order breakdown.
//!
//! Each colour box is expanded, its FREE accounting table located, and the
//! table body folded row by row. Section header rows switch what the
//! following main and sub rows mean, so the same label ("Stock") lands in
//! different fields depending on where it appears.

use scraper::{ElementRef, Html};
use stylesync_core::{BoxSource, LabeledRow, PurchaseOrder, QuantityRow, VariantBox};

use super::stat_view::{open_stat_view, parse_collapsed_box, stat_boxes, DETAILS_REGION};
use crate::driver::Driver;
use crate::error::DetailError;
use crate::events::Reporter;
use crate::parse_helpers::{
    absolutize, attr, body_rows_of, first_line, has_class, read_per_size, row_cells, select_all,
    select_first, text_of,
};
use crate::poll::{poll_until, Timings};

const FREE_TABLE: &str = ".statAndStockDetails table.tableRadius5.tableBorder";
const TOGGLE_ICON: &str = ".statAndStockToggle, .fa-plus-square, .fa-caret-down";
const TOGGLE_HEADER: &str = "tr.tableBackgroundBlack td";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// `stylecolor-expanded--header`: opens a section.
    Header,
    /// `stylecolor-expanded--main`
    Main,
    /// `stylecolor-expanded--sub`: PO lines and their dedicated allocations.
    Sub,
    Plain,
}

/// A body row reduced to what the fold needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub kind: RowKind,
    pub label: String,
    pub per_size: Vec<f64>,
    pub total: f64,
    /// `(code, absolute href)` of the row's link.
    pub link: Option<(String, String)>,
    pub eta: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Section {
    #[default]
    None,
    Sold,
    Available,
    Purchase,
    Net,
    Other,
}

impl Section {
    fn from_header(label: &str) -> Self {
        let lower = label.trim().to_lowercase();
        if lower == "sold" {
            Self::Sold
        } else if lower == "available" {
            Self::Available
        } else if lower.starts_with("purchase") {
            Self::Purchase
        } else if lower.contains("net need") {
            Self::Net
        } else {
            Self::Other
        }
    }
}

/// Accumulator of the section fold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandedFold {
    section: Section,
    current_po: Option<usize>,
    pub stock: Option<QuantityRow>,
    pub sold_per_season: Vec<LabeledRow>,
    pub purchase_totals: Vec<LabeledRow>,
    pub purchase_orders: Vec<PurchaseOrder>,
    pub available_dedicated_to_pre: Option<QuantityRow>,
    /// Rows that could not be placed, for the job log.
    pub notes: Vec<String>,
}

fn quantities(row: &RowView) -> QuantityRow {
    QuantityRow {
        per_size: row.per_size.clone(),
        total: row.total,
    }
}

fn labeled(row: &RowView) -> LabeledRow {
    LabeledRow {
        label: row.label.clone(),
        per_size: row.per_size.clone(),
        total: row.total,
    }
}

impl ExpandedFold {
    #[must_use]
    pub fn step(mut self, row: &RowView) -> Self {
        let label = row.label.trim();
        let lower = label.to_lowercase();

        if row.kind == RowKind::Header {
            self.section = Section::from_header(label);
            return self;
        }

        match self.section {
            Section::None | Section::Other => {
                if row.kind == RowKind::Main && lower == "stock" && self.stock.is_none() {
                    self.stock = Some(quantities(row));
                }
            }
            Section::Sold => {
                if row.kind == RowKind::Main && lower != "total sold" {
                    self.sold_per_season.push(labeled(row));
                }
            }
            Section::Purchase => self.purchase_row(row, &lower),
            Section::Available => {
                if row.kind == RowKind::Main && lower == "stock dedicated to pre" {
                    self.available_dedicated_to_pre = Some(quantities(row));
                }
            }
            Section::Net => {}
        }
        self
    }

    fn purchase_row(&mut self, row: &RowView, lower: &str) {
        match row.kind {
            RowKind::Main if !lower.starts_with("total po") => {
                self.purchase_totals.push(labeled(row));
            }
            RowKind::Sub => {
                if let Some((code, href)) = &row.link {
                    self.purchase_orders.push(PurchaseOrder {
                        code: code.clone(),
                        link: href.clone(),
                        eta: row.eta.clone(),
                        per_size: row.per_size.clone(),
                        total: row.total,
                        ..PurchaseOrder::default()
                    });
                    self.current_po = Some(self.purchase_orders.len() - 1);
                    return;
                }
                let stock = lower == "stock dedicated";
                let pre = lower == "pre dedicated";
                if !stock && !pre {
                    return;
                }
                let Some(po) = self.current_po.and_then(|i| self.purchase_orders.get_mut(i)) else {
                    self.notes.push(format!("orphan \"{}\" row before any PO", row.label.trim()));
                    return;
                };
                if stock {
                    po.dedicated_stock_per_size = Some(row.per_size.clone());
                    po.dedicated_stock_total = Some(row.total);
                } else {
                    po.dedicated_pre_per_size = Some(row.per_size.clone());
                    po.dedicated_pre_total = Some(row.total);
                }
            }
            _ => {}
        }
    }
}

/// Fold body rows, in document order, into the expanded reading.
pub fn fold_expanded_rows<'a>(rows: impl IntoIterator<Item = &'a RowView>) -> ExpandedFold {
    rows.into_iter()
        .fold(ExpandedFold::default(), |acc, row| acc.step(row))
}

fn row_view(tr: ElementRef<'_>, width: usize, page_url: &str) -> RowView {
    let kind = if has_class(tr, "stylecolor-expanded--header") {
        RowKind::Header
    } else if has_class(tr, "stylecolor-expanded--main") {
        RowKind::Main
    } else if has_class(tr, "stylecolor-expanded--sub") {
        RowKind::Sub
    } else {
        RowKind::Plain
    };
    let cells = row_cells(tr);
    let label = cells.first().map(|c| text_of(*c)).unwrap_or_default();
    let (per_size, total) = read_per_size(&cells, width);
    let link = select_first(tr, "td a[href]").and_then(|a| {
        let href = attr(a, "href")?;
        Some((text_of(a), absolutize(page_url, &href)))
    });
    let eta = select_first(tr, "td .right")
        .map(text_of)
        .filter(|t| !t.is_empty());
    RowView {
        kind,
        label,
        per_size,
        total,
        link,
        eta,
    }
}

/// The accounting table whose second body row is labelled FREE.
fn free_table(stat_box: ElementRef<'_>) -> Option<ElementRef<'_>> {
    select_all(stat_box, FREE_TABLE).into_iter().find(|table| {
        // Body row 0 is the colour/size header; FREE is the row after it.
        body_rows_of(*table)
            .get(1)
            .and_then(|tr| row_cells(*tr).first().copied())
            .is_some_and(|td| text_of(td).eq_ignore_ascii_case("free"))
    })
}

/// One box's reading plus what happened while producing it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BoxReading {
    pub variant: VariantBox,
    pub notes: Vec<String>,
}

fn expanded_reading(table: ElementRef<'_>, page_url: &str) -> BoxReading {
    let rows = body_rows_of(table);
    let header = rows.first().map(|tr| row_cells(*tr)).unwrap_or_default();
    let color_name = header.first().map(|c| first_line(*c)).unwrap_or_default();
    let sizes: Vec<String> = header
        .iter()
        .skip(1)
        .map(|c| text_of(*c))
        .take_while(|label| !label.eq_ignore_ascii_case("total"))
        .collect();

    let views: Vec<RowView> = rows
        .iter()
        .skip(1)
        .map(|tr| row_view(*tr, sizes.len(), page_url))
        .collect();
    let fold = fold_expanded_rows(&views);

    let mut notes = vec![format!(
        "FREE table chosen for {color_name} ({} sizes, {} rows)",
        sizes.len(),
        views.len()
    )];
    notes.push(format!("{} PO rows found for {color_name}", fold.purchase_orders.len()));
    notes.extend(fold.notes.iter().map(|n| format!("{color_name}: {n}")));

    BoxReading {
        variant: VariantBox {
            color_name,
            sizes,
            stock: fold.stock,
            sold_per_season: fold.sold_per_season,
            purchase_totals: fold.purchase_totals,
            purchase_orders: fold.purchase_orders,
            available_dedicated_to_pre: fold.available_dedicated_to_pre,
            source: BoxSource::Expanded,
        },
        notes,
    }
}

fn collapsed_reading(stat_box: ElementRef<'_>) -> BoxReading {
    let collapsed = parse_collapsed_box(stat_box);
    let to_quantities = |r: LabeledRow| QuantityRow {
        per_size: r.per_size,
        total: r.total,
    };
    let sold_per_season = ["sold stock", "sold pre"]
        .iter()
        .filter_map(|label| collapsed.pick(label))
        .collect();
    let variant = VariantBox {
        stock: collapsed.pick("stock").map(to_quantities),
        purchase_totals: collapsed.pick("po (running + shipped)").into_iter().collect(),
        sold_per_season,
        purchase_orders: Vec::new(),
        available_dedicated_to_pre: None,
        source: BoxSource::Collapsed,
        color_name: collapsed.color_name,
        sizes: collapsed.sizes,
    };
    let notes = vec![format!(
        "no FREE table for {}, using collapsed reading",
        variant.color_name
    )];
    BoxReading { variant, notes }
}

/// Read every box on the page, expanded where possible.
pub(crate) fn parse_variant_boxes(html: &str, page_url: &str) -> Vec<BoxReading> {
    let doc = Html::parse_document(html);
    stat_boxes(&doc)
        .into_iter()
        .map(|b| match free_table(b) {
            Some(table) => expanded_reading(table, page_url),
            None => collapsed_reading(b),
        })
        .collect()
}

fn box_expanded(doc: &Html, index: usize) -> bool {
    stat_boxes(doc)
        .get(index)
        .is_some_and(|b| {
            select_first(*b, DETAILS_REGION).is_some_and(|d| select_first(d, "table").is_some())
        })
}

fn toggle_script(index: usize, via: &str, selector: &str) -> String {
    let selector = serde_json::Value::String(selector.to_string());
    format!(
        "/* expand box {index} via {via} */ (() => {{ \
         const box = document.querySelectorAll('.statAndStockBox')[{index}]; \
         const t = box && box.querySelector({selector}); \
         if (!t) return false; t.click(); return true; }})()"
    )
}

async fn expand_box(
    driver: &dyn Driver,
    index: usize,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) {
    let already = match driver.content().await {
        Ok(html) => box_expanded(&Html::parse_document(&html), index),
        Err(_) => false,
    };
    if already {
        return;
    }

    for (via, selector) in [("icon", TOGGLE_ICON), ("header", TOGGLE_HEADER)] {
        if let Err(e) = driver.evaluate(&toggle_script(index, via, selector)).await {
            reporter.log(format!("STEP: Box {index} toggle ({via}) error: {e}"));
            continue;
        }
        let opened = poll_until(driver, timings.expansion, timings.poll_interval, |doc| {
            box_expanded(doc, index)
        })
        .await;
        if opened {
            reporter.log(format!("STEP: Box {index} expanded via {via}"));
            return;
        }
    }
    reporter.log(format!("STEP: Box {index} did not expand"));
}

/// Open the stat & stock view, expand every colour box and read the FREE
/// accounting tables, falling back to the collapsed matrix per box.
///
/// # Errors
///
/// Returns [`DetailError::ExpansionTimeout`] only when no box appears at all,
/// and [`DetailError::Driver`] if the page cannot be opened or read.
pub async fn extract_expanded_free(
    driver: &dyn Driver,
    item_url: &str,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) -> Result<Vec<VariantBox>, DetailError> {
    if !open_stat_view(driver, item_url, timings, reporter).await? {
        return Err(DetailError::ExpansionTimeout {
            url: item_url.to_string(),
            timeout_ms: u64::try_from(timings.stat_boxes.as_millis()).unwrap_or(u64::MAX),
        });
    }

    let count = {
        let html = driver.content().await?;
        stat_boxes(&Html::parse_document(&html)).len()
    };
    reporter.log(format!("STEP: Expanding {count} stat boxes"));
    for index in 0..count {
        expand_box(driver, index, timings, reporter).await;
    }

    let page_url = driver.current_url().await?;
    let html = driver.content().await?;
    let readings = parse_variant_boxes(&html, &page_url);

    let mut variants = Vec::with_capacity(readings.len());
    for reading in readings {
        for note in &reading.notes {
            reporter.log(format!("STEP: {note}"));
        }
        if !reading.variant.is_aligned() {
            tracing::error!(
                color = %reading.variant.color_name,
                "per-size arrays misaligned with size axis"
            );
        }
        variants.push(reading.variant);
    }
    Ok(variants)
}

#[cfg(test)]
#[path = "statstock_test.rs"]
mod tests;
