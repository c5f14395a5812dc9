//! Per-item detail extractors.

mod assortment;
mod stat_view;
mod statstock;
mod stock_matrix;

pub use assortment::{extract_assortments, parse_assortments};
pub use stat_view::stat_url;
pub use statstock::{extract_expanded_free, fold_expanded_rows, ExpandedFold, RowKind, RowView};
pub use stock_matrix::{extract_stock_matrix, parse_stock_boxes};
