//! Catalog list table → [`CatalogItem`]s.
//!
//! Columns are located by header text, so the site reordering its columns
//! does not shift values between fields.

use scraper::{ElementRef, Html};
use stylesync_core::{AuxLinks, CatalogItem};

use crate::parse_helpers::{absolutize, attr, row_cells, select_all, select_first, text_of};

const LIST_TABLE: &str = "table.standardList";

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListColumns {
    pub style_no: usize,
    pub style_name: Option<usize>,
    pub brand: Option<usize>,
    pub season: Option<usize>,
    pub supplier: Option<usize>,
    pub image: Option<usize>,
}

/// Resolve columns by case-insensitive substring match on header text.
/// Without a "style no" header the second column is assumed.
pub(crate) fn resolve_columns(headers: &[String]) -> ListColumns {
    let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    let find = |needle: &str| lower.iter().position(|h| h.contains(needle));
    ListColumns {
        style_no: find("style no").unwrap_or(1),
        style_name: find("style name"),
        brand: find("brand"),
        season: find("season"),
        supplier: find("supplier"),
        image: find("image").or_else(|| find("img")),
    }
}

/// The catalog table: the first list table with body rows, else the first one.
fn list_table(doc: &Html) -> Option<ElementRef<'_>> {
    let tables = select_all(doc.root_element(), LIST_TABLE);
    tables
        .iter()
        .copied()
        .find(|t| !body_rows(*t).is_empty())
        .or_else(|| tables.first().copied())
}

fn body_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    select_all(table, "tbody tr")
        .into_iter()
        .filter(|tr| row_cells(*tr).iter().any(|c| c.value().name() == "td"))
        .collect()
}

/// Whether the catalog table has at least one body row.
pub(crate) fn has_list_rows(doc: &Html) -> bool {
    list_table(doc).is_some_and(|t| !body_rows(t).is_empty())
}

/// Number of body rows in the catalog table.
pub(crate) fn list_row_count(doc: &Html) -> usize {
    list_table(doc).map_or(0, |t| body_rows(t).len())
}

fn header_texts(table: ElementRef<'_>) -> Vec<String> {
    let head = select_all(table, "thead th");
    if !head.is_empty() {
        return head.into_iter().map(text_of).collect();
    }
    select_first(table, "tr")
        .map(|tr| row_cells(tr).into_iter().map(text_of).collect())
        .unwrap_or_default()
}

/// Detail URL synthesized from a row's numeric reference.
pub(crate) fn style_url(base_url: &str, reference_id: &str) -> String {
    format!("{base_url}/?controller=Style%5CIndex&action=Edit&id={reference_id}")
}

/// Request the full-size image instead of the list thumbnail.
pub(crate) fn upsize_thumbnail(src: &str) -> String {
    src.replace("/thumbs/", "/").replace("_thumb.", ".")
}

fn aux_links(row: ElementRef<'_>, page_url: &str) -> AuxLinks {
    let mut links = AuxLinks::default();
    for anchor in select_all(row, "a[href]") {
        let Some(href) = attr(anchor, "href") else {
            continue;
        };
        let lower = href.to_lowercase();
        if links.sales.is_none() && lower.contains("controller=sales") {
            links.sales = Some(absolutize(page_url, &href));
        } else if links.purchase_orders.is_none() && lower.contains("purchase") {
            links.purchase_orders = Some(absolutize(page_url, &href));
        }
    }
    links
}

/// Parse every usable catalog row of the list page.
///
/// `page_url` resolves relative links and `base_url` synthesizes detail URLs
/// for rows that only carry a reference id. Rows without both a link and a
/// style number are dropped; `index` is the row's position in the table.
pub fn parse_catalog_rows(html: &str, page_url: &str, base_url: &str) -> Vec<CatalogItem> {
    let doc = Html::parse_document(html);
    let Some(table) = list_table(&doc) else {
        return Vec::new();
    };
    let columns = resolve_columns(&header_texts(table));

    body_rows(table)
        .into_iter()
        .enumerate()
        .filter_map(|(index, tr)| parse_row(index, tr, &columns, page_url, base_url))
        .collect()
}

fn parse_row(
    index: usize,
    tr: ElementRef<'_>,
    columns: &ListColumns,
    page_url: &str,
    base_url: &str,
) -> Option<CatalogItem> {
    let cells = row_cells(tr);
    let cell_text = |i: Option<usize>| {
        i.and_then(|i| cells.get(i))
            .map(|c| text_of(*c))
            .unwrap_or_default()
    };

    let reference_id = attr(tr, "data-reference").unwrap_or_default();
    let style_cell = cells.get(columns.style_no).copied();
    let style_link = style_cell.and_then(|c| select_first(c, "a[href]"));

    let style_no = style_link
        .map(text_of)
        .filter(|t| !t.is_empty())
        .or_else(|| style_cell.map(text_of))
        .unwrap_or_default();

    let href = match style_link.and_then(|a| attr(a, "href")) {
        Some(href) => absolutize(page_url, &href),
        None if !reference_id.is_empty() && reference_id.chars().all(|c| c.is_ascii_digit()) => {
            style_url(base_url, &reference_id)
        }
        None => String::new(),
    };

    if href.is_empty() || style_no.is_empty() {
        return None;
    }

    let image_cell = columns
        .image
        .and_then(|i| cells.get(i).copied())
        .or_else(|| cells.iter().copied().find(|c| select_first(*c, "img").is_some()));
    let image_url = image_cell
        .and_then(|c| select_first(c, "img"))
        .and_then(|img| attr(img, "src"))
        .map(|src| upsize_thumbnail(&absolutize(page_url, &src)));

    Some(CatalogItem {
        index,
        style_no,
        style_name: cell_text(columns.style_name),
        href,
        reference_id,
        brand: cell_text(columns.brand),
        season: cell_text(columns.season),
        supplier: cell_text(columns.supplier),
        image_url,
        links: aux_links(tr, page_url),
    })
}

#[cfg(test)]
#[path = "list_parse_test.rs"]
mod tests;
