//! Plain listing tables captured cell by cell: the running purchase orders
//! and the pre-order basket of a style.

use scraper::{ElementRef, Html};
use stylesync_core::{CellImage, CellLink, TableCell, TableSnapshot};

use crate::driver::Driver;
use crate::error::DetailError;
use crate::events::Reporter;
use crate::parse_helpers::{
    absolutize, attr, body_rows_of, row_cells, select_all, select_first, text_of,
};
use crate::poll::{poll_until, Timings};

pub const PURCHASES_TABLE: &str = ".app-outlet table";
pub const STOCK_PRE_TABLE: &str = ".basketbox table.standardList";

#[must_use]
pub fn purchases_url(base_url: &str) -> String {
    format!("{base_url}/app/purchase/running")
}

fn capture_cell(td: ElementRef<'_>, page_url: &str) -> TableCell {
    let link = select_first(td, "a[href]").and_then(|a| {
        Some(CellLink {
            href: absolutize(page_url, &attr(a, "href")?),
            text: text_of(a),
        })
    });
    let image = select_first(td, "img[src]").and_then(|img| {
        Some(CellImage {
            src: absolutize(page_url, &attr(img, "src")?),
            alt: attr(img, "alt").unwrap_or_default(),
        })
    });
    TableCell {
        text: text_of(td),
        link,
        image,
    }
}

/// Snapshot the first table matching `selector`. `None` when absent.
#[must_use]
pub fn parse_table(html: &str, selector: &str, page_url: &str) -> Option<TableSnapshot> {
    let doc = Html::parse_document(html);
    let table = select_first(doc.root_element(), selector)?;

    let head = select_first(table, "thead tr")
        .or_else(|| select_first(table, "tr"))
        .map(|tr| {
            select_all(tr, "th")
                .into_iter()
                .map(text_of)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let rows = body_rows_of(table)
        .into_iter()
        .map(|tr| {
            row_cells(tr)
                .into_iter()
                .map(|td| capture_cell(td, page_url))
                .collect()
        })
        .collect();

    Some(TableSnapshot { head, rows })
}

fn table_ready(doc: &Html, selector: &str) -> bool {
    select_first(doc.root_element(), selector).is_some_and(|t| select_first(t, "tr").is_some())
}

/// Navigate to `url`, wait for `selector` and capture it.
///
/// # Errors
///
/// Returns [`DetailError::NotFound`] if the table never appears and
/// [`DetailError::Driver`] if the page cannot be opened or read.
pub async fn capture_table(
    driver: &dyn Driver,
    url: &str,
    selector: &str,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) -> Result<TableSnapshot, DetailError> {
    reporter.log(format!("STEP: Opening {url}"));
    driver.navigate(url).await?;

    reporter.log(format!("STEP: Waiting for table {selector}"));
    let ready = poll_until(driver, timings.table, timings.table_poll_interval, |doc| {
        table_ready(doc, selector)
    })
    .await;
    let not_found = || DetailError::NotFound {
        what: format!("Table {selector}"),
        url: url.to_string(),
    };
    if !ready {
        return Err(not_found());
    }

    let page_url = driver.current_url().await?;
    let html = driver.content().await?;
    let snapshot = parse_table(&html, selector, &page_url).ok_or_else(not_found)?;
    reporter.log(format!(
        "STEP: Captured {} columns, {} rows",
        snapshot.head.len(),
        snapshot.rows.len()
    ));
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BufferedSink;
    use crate::testing::FakeDriver;

    const PURCHASES: &str = r#"<html><body><div class="app-outlet">
      <table>
        <thead><tr><th>PO</th><th>Supplier</th><th>Image</th></tr><tr><th>filter</th></tr></thead>
        <tbody>
          <tr><td><a href="/app/purchase/edit/100">PO-100</a></td><td>Mills Ltd</td>
              <td><img src="/img/p100.jpg" alt="Coat"></td></tr>
          <tr><td>PO-101</td><td>  Weavers   Co </td><td></td></tr>
        </tbody>
      </table></div></body></html>"#;

    #[test]
    fn captures_head_and_cells() {
        let table = parse_table(PURCHASES, PURCHASES_TABLE, "https://erp.test/app/purchase/running")
            .expect("table");

        assert_eq!(table.head, vec!["PO", "Supplier", "Image"]);
        assert_eq!(table.rows.len(), 2);

        let first = &table.rows[0];
        assert_eq!(first[0].text, "PO-100");
        assert_eq!(
            first[0].link,
            Some(CellLink {
                href: "https://erp.test/app/purchase/edit/100".to_string(),
                text: "PO-100".to_string(),
            })
        );
        assert_eq!(
            first[2].image,
            Some(CellImage {
                src: "https://erp.test/img/p100.jpg".to_string(),
                alt: "Coat".to_string(),
            })
        );
        assert_eq!(table.rows[1][1].text, "Weavers Co");
        assert!(table.rows[1][0].link.is_none());
    }

    #[test]
    fn missing_table_is_none() {
        let empty = "<html><body></body></html>";
        assert!(parse_table(empty, STOCK_PRE_TABLE, "https://erp.test").is_none());
    }

    #[tokio::test]
    async fn capture_polls_until_table_appears() {
        let driver = FakeDriver::new().with_page("/app/purchase/running", PURCHASES);
        let mut sink = BufferedSink::new();
        let mut reporter = Reporter::new(&mut sink);

        let snapshot = capture_table(
            &driver,
            &purchases_url("https://erp.test"),
            PURCHASES_TABLE,
            &Timings::instant(),
            &mut reporter,
        )
        .await
        .expect("snapshot");

        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(driver.navigations(), vec!["https://erp.test/app/purchase/running".to_string()]);
    }

    #[tokio::test]
    async fn capture_reports_missing_table() {
        let driver = FakeDriver::new();
        let mut sink = BufferedSink::new();
        let mut reporter = Reporter::new(&mut sink);

        let url = "https://erp.test/?id=3";
        let err = capture_table(&driver, url, STOCK_PRE_TABLE, &Timings::instant(), &mut reporter)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Table .basketbox table.standardList not found on https://erp.test/?id=3"
        );
    }
}
