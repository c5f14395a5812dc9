//! Typed data model produced by the extractors.
//!
//! Every per-size vector is positionally aligned with the `sizes` axis of the
//! box or matrix it belongs to. Serialized field names are camelCase because
//! the dashboard consumes them verbatim.

use serde::{Deserialize, Serialize};

/// Deep links found next to a catalog row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_orders: Option<String>,
}

/// One inspectable style from the catalog list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    /// Position in the acquired list (before any `limit` truncation).
    pub index: usize,
    pub style_no: String,
    pub style_name: String,
    /// Absolute URL of the style detail page.
    pub href: String,
    /// Numeric row reference (`data-reference`), empty when unknown.
    #[serde(rename = "id")]
    pub reference_id: String,
    pub brand: String,
    pub season: String,
    pub supplier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub links: AuxLinks,
}

/// Per-size quantities with the total the page reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityRow {
    pub per_size: Vec<f64>,
    pub total: f64,
}

#[cfg(test)]
impl QuantityRow {
    fn zeros(width: usize) -> Self {
        Self {
            per_size: vec![0.0; width],
            total: 0.0,
        }
    }
}

/// A [`QuantityRow`] tagged with the label of the row it was read from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledRow {
    pub label: String,
    pub per_size: Vec<f64>,
    pub total: f64,
}

/// An incoming purchase order and the part of it dedicated to stock / pre-orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub code: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    pub per_size: Vec<f64>,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedicated_stock_per_size: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedicated_stock_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedicated_pre_per_size: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedicated_pre_total: Option<f64>,
}

/// Which reading of the stat & stock view produced a [`VariantBox`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxSource {
    #[default]
    Expanded,
    /// The accounting table was unavailable; only the collapsed matrix was read.
    Collapsed,
}

/// One colour variant's inventory snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantBox {
    pub color_name: String,
    pub sizes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<QuantityRow>,
    pub sold_per_season: Vec<LabeledRow>,
    pub purchase_totals: Vec<LabeledRow>,
    pub purchase_orders: Vec<PurchaseOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_dedicated_to_pre: Option<QuantityRow>,
    pub source: BoxSource,
}

impl VariantBox {
    /// `true` when every per-size vector in the box matches the size axis.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        let width = self.sizes.len();
        let rows = self
            .stock
            .iter()
            .chain(self.available_dedicated_to_pre.iter())
            .map(|r| r.per_size.len());
        let labeled = self
            .sold_per_season
            .iter()
            .chain(self.purchase_totals.iter())
            .map(|r| r.per_size.len());
        let orders = self.purchase_orders.iter().flat_map(|po| {
            std::iter::once(po.per_size.len())
                .chain(po.dedicated_stock_per_size.as_ref().map(Vec::len))
                .chain(po.dedicated_pre_per_size.as_ref().map(Vec::len))
        });
        rows.chain(labeled).chain(orders).all(|len| len == width)
    }
}

/// The collapsed stat & stock matrix of one colour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockBox {
    pub color_name: String,
    pub sizes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<LabeledRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<LabeledRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<LabeledRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub po: Option<LabeledRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_stock: Option<LabeledRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_pre: Option<LabeledRow>,
}

/// A named pack on the materials tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssortmentRow {
    pub label: String,
    pub active: bool,
    pub per_size: Vec<f64>,
    pub total: f64,
    pub min_qty: f64,
}

/// Size matrix of a style: named assortments plus the reserved FREE row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssortmentDetail {
    pub sizes: Vec<String>,
    /// Per-size FREE stock, aligned with `sizes`; `None` when no FREE row exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free: Option<Vec<f64>>,
    pub assortments: Vec<AssortmentRow>,
    /// Raw header texts of the size table, for diagnostics.
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellLink {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellImage {
    pub src: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCell {
    pub text: String,
    pub link: Option<CellLink>,
    pub image: Option<CellImage>,
}

/// A plain listing table captured cell by cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub head: Vec<String>,
    pub rows: Vec<Vec<TableCell>>,
}
