//! Shared pieces of the stat & stock view: URL, box discovery and the
//! collapsed per-colour matrix.

use scraper::{ElementRef, Html};
use stylesync_core::LabeledRow;

use crate::driver::Driver;
use crate::events::Reporter;
use crate::parse_helpers::{first_line, has_class, parse_quantity, row_cells, select_all, text_of};
use crate::poll::{poll_until, Timings};

pub(crate) const STAT_BOX: &str = ".statAndStockBox";
pub(crate) const DETAILS_REGION: &str = ".statAndStockDetails";
const HEADER_ROW: &str = "tr.tableBackgroundBlack";

/// The item URL with its fragment pointing at the stat & stock tab.
#[must_use]
pub fn stat_url(item_url: &str) -> String {
    match url::Url::parse(item_url) {
        Ok(mut url) => {
            url.set_fragment(Some("tab=statandstock"));
            url.to_string()
        }
        Err(_) => format!("{}#tab=statandstock", item_url.split('#').next().unwrap_or(item_url)),
    }
}

pub(crate) fn stat_boxes(doc: &Html) -> Vec<ElementRef<'_>> {
    select_all(doc.root_element(), STAT_BOX)
}

/// Open the stat & stock view and wait for at least one box. Returns `false`
/// when none appeared within the bound.
pub(crate) async fn open_stat_view(
    driver: &dyn Driver,
    item_url: &str,
    timings: &Timings,
    reporter: &mut Reporter<'_>,
) -> Result<bool, crate::error::DriverError> {
    let target = stat_url(item_url);
    reporter.log(format!("STEP: Opening stock tab {target}"));
    driver.navigate(&target).await?;

    reporter.log("STEP: Waiting for .statAndStockBox elements");
    Ok(poll_until(driver, timings.stat_boxes, timings.poll_interval, |doc| {
        !stat_boxes(doc).is_empty()
    })
    .await)
}

fn inside_details(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| has_class(a, "statAndStockDetails"))
}

/// The collapsed matrix of one box, before rows are picked by label.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CollapsedBox {
    pub color_name: String,
    pub sizes: Vec<String>,
    pub rows: Vec<LabeledRow>,
}

impl CollapsedBox {
    /// Row with exactly this label (case-insensitive), else the first whose
    /// label contains it.
    pub(crate) fn pick(&self, label: &str) -> Option<LabeledRow> {
        let needle = label.to_lowercase();
        self.rows
            .iter()
            .find(|r| r.label.to_lowercase() == needle)
            .or_else(|| self.rows.iter().find(|r| r.label.to_lowercase().contains(&needle)))
            .cloned()
    }
}

/// Read the collapsed matrix of a box, ignoring anything inside an expanded
/// details region.
pub(crate) fn parse_collapsed_box(stat_box: ElementRef<'_>) -> CollapsedBox {
    let header = select_all(stat_box, HEADER_ROW)
        .into_iter()
        .find(|tr| !inside_details(*tr));
    let (color_name, sizes) = header.map_or_else(
        || (String::new(), Vec::new()),
        |tr| {
            let cells = row_cells(tr);
            let color = cells.first().map(|c| first_line(*c)).unwrap_or_default();
            let sizes: Vec<String> = cells
                .iter()
                .skip(1)
                .map(|c| text_of(*c))
                .filter(|s| !s.is_empty())
                .collect();
            (color, sizes)
        },
    );
    let width = sizes.len();

    let rows = select_all(stat_box, "tbody tr")
        .into_iter()
        .filter(|tr| !inside_details(*tr) && !has_class(*tr, "tableBackgroundBlack"))
        .filter_map(|tr| {
            let cells = row_cells(tr);
            let label = cells.first().map(|c| text_of(*c))?;
            if label.is_empty() || label.eq_ignore_ascii_case("total") {
                return None;
            }
            let per_size: Vec<f64> = (1..=width)
                .map(|i| cells.get(i).map_or(0.0, |td| parse_quantity(&text_of(*td))))
                .collect();
            let total = per_size.iter().sum();
            Some(LabeledRow {
                label,
                per_size,
                total,
            })
        })
        .collect();

    CollapsedBox {
        color_name,
        sizes,
        rows,
    }
}
