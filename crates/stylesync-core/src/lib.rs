mod app_config;
mod config;
pub mod model;
pub mod request;

pub use app_config::{AppConfig, BrowserSettings, Credentials, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use model::{
    AssortmentDetail, AssortmentRow, AuxLinks, BoxSource, CatalogItem, CellImage, CellLink,
    LabeledRow, PurchaseOrder, QuantityRow, StockBox, TableCell, TableSnapshot, VariantBox,
};
pub use request::{JobMode, JobRequest, LinkInput};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
