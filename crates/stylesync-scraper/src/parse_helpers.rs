//! Small DOM primitives shared by the list, detail and table parsers.
//!
//! Everything here works on a parsed `scraper::Html` snapshot of the page and
//! is synchronous: `Html` is not `Send`, so callers parse, extract into owned
//! values, and drop the document before the next await point.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(?:\d+(?:\.\d*)?|\.\d+)").expect("valid regex"));

/// Lenient numeric parse used for every quantity cell.
///
/// Keeps only digits, `.` and `-`, then reads the longest leading number.
/// Anything unreadable is 0: `"1,234"` → 1234, `"12.5 pcs"` → 12.5,
/// `""` → 0, `"-"` → 0.
#[must_use]
pub fn parse_quantity(raw: &str) -> f64 {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    LEADING_NUMBER
        .find(&kept)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Run `css` against the descendants of `root`. An invalid selector matches
/// nothing.
pub(crate) fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => root.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

pub(crate) fn select_first<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    Selector::parse(css)
        .ok()
        .and_then(|selector| root.select(&selector).next())
}

/// Whether `css` matches anything in the document.
pub(crate) fn exists(doc: &Html, css: &str) -> bool {
    select_first(doc.root_element(), css).is_some()
}

/// Whitespace-collapsed text content.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First non-blank text line of an element, where `<br>` and block children
/// start new lines. Used for header cells that stack the colour name above
/// extra details.
pub(crate) fn first_line(el: ElementRef<'_>) -> String {
    let mut rendered = String::new();
    for node in el.descendants() {
        if let Some(text) = node.value().as_text() {
            rendered.push_str(text);
        } else if let Some(element) = node.value().as_element() {
            if matches!(element.name(), "br" | "div" | "p" | "li") {
                rendered.push('\n');
            }
        }
    }
    rendered
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Direct `td`/`th` children of a row, ignoring cells of nested tables.
pub(crate) fn row_cells(tr: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| matches!(child.value().name(), "td" | "th"))
        .collect()
}

/// Rows of a table's own `tbody` sections, skipping rows of nested tables.
pub(crate) fn body_rows_of(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    table
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|section| section.value().name() == "tbody")
        .flat_map(|tbody| {
            tbody
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|tr| tr.value().name() == "tr")
        })
        .collect()
}

pub(crate) fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

pub(crate) fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Value of the first text input inside `el`, as serialized in the DOM.
pub(crate) fn text_input_value(el: ElementRef<'_>) -> Option<String> {
    select_first(el, r#"input[type="text"]"#).map(|input| {
        input
            .value()
            .attr("value")
            .unwrap_or_default()
            .trim()
            .to_string()
    })
}

/// Resolve `href` against `base`; returns the input unchanged if it cannot be
/// resolved.
pub(crate) fn absolutize(base: &str, href: &str) -> String {
    url::Url::parse(base)
        .and_then(|b| b.join(href))
        .map_or_else(|_| href.to_string(), |u| u.to_string())
}

/// Read `width` quantities from `cells[1..=width]`, padding missing cells
/// with 0, and the total from the cell right after them.
pub(crate) fn read_per_size(cells: &[ElementRef<'_>], width: usize) -> (Vec<f64>, f64) {
    let per_size = (0..width)
        .map(|i| cells.get(i + 1).map_or(0.0, |td| parse_quantity(&text_of(*td))))
        .collect();
    let total = cells
        .get(width + 1)
        .map_or(0.0, |td| parse_quantity(&text_of(*td)));
    (per_size, total)
}
