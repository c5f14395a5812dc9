//! Job parameters accepted by the server and the CLI.

use serde::{Deserialize, Serialize};

use crate::model::CatalogItem;

/// What each item of a job is turned into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Assortment / size matrix from the materials tab.
    #[default]
    Detail,
    /// Collapsed stat & stock matrix.
    Stock,
    /// Expanded stat & stock with the purchase-order breakdown.
    StatstockFree,
    /// Running purchase orders listing. Ignores links and the catalog.
    Purchases,
    /// Stock / pre-order basket table of each explicit link.
    StockPre,
}

impl JobMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::Stock => "stock",
            Self::StatstockFree => "statstock_free",
            Self::Purchases => "purchases",
            Self::StockPre => "stock_pre",
        }
    }
}

impl std::fmt::Display for JobMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detail" => Ok(Self::Detail),
            "stock" => Ok(Self::Stock),
            "statstock_free" => Ok(Self::StatstockFree),
            "purchases" => Ok(Self::Purchases),
            "stock_pre" => Ok(Self::StockPre),
            other => Err(format!("unknown job mode \"{other}\"")),
        }
    }
}

/// An explicit item the caller wants processed instead of the listed catalog.
///
/// Accepts either a bare href string or an object carrying known metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawLink")]
pub struct LinkInput {
    pub href: String,
    pub style_no: Option<String>,
    pub style_name: Option<String>,
    pub supplier: Option<String>,
    pub brand: Option<String>,
    pub season: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLink {
    Href(String),
    Detailed {
        href: String,
        #[serde(default, rename = "styleNo")]
        style_no: Option<String>,
        #[serde(default, rename = "styleName")]
        style_name: Option<String>,
        #[serde(default)]
        supplier: Option<String>,
        #[serde(default)]
        brand: Option<String>,
        #[serde(default)]
        season: Option<String>,
    },
}

impl From<RawLink> for LinkInput {
    fn from(raw: RawLink) -> Self {
        match raw {
            RawLink::Href(href) => Self {
                href,
                ..Self::default()
            },
            RawLink::Detailed {
                href,
                style_no,
                style_name,
                supplier,
                brand,
                season,
            } => Self {
                href,
                style_no,
                style_name,
                supplier,
                brand,
                season,
            },
        }
    }
}

/// One extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default)]
    pub mode: JobMode,
    #[serde(default)]
    pub links: Vec<LinkInput>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub skip_details: bool,
    #[serde(default)]
    pub season_text: Option<String>,
}

impl JobRequest {
    /// The truncation bound, if the caller asked for a positive one.
    #[must_use]
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
    }

    /// Season filter text with surrounding whitespace removed; `None` when blank.
    #[must_use]
    pub fn season(&self) -> Option<&str> {
        self.season_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Turn the explicit links into catalog items.
    ///
    /// Hrefs are resolved against `base_url`; unparseable ones are skipped and
    /// duplicates (after resolution) keep their first occurrence. A missing
    /// style number is taken from the text after the last `id=`, falling back
    /// to the 1-based position.
    #[must_use]
    pub fn resolve_links(&self, base_url: &str) -> Vec<CatalogItem> {
        let Ok(base) = url::Url::parse(&format!("{}/", base_url.trim_end_matches('/'))) else {
            return Vec::new();
        };

        let mut seen = std::collections::HashSet::new();
        let mut items = Vec::new();
        for link in &self.links {
            let Ok(absolute) = base.join(link.href.trim()) else {
                continue;
            };
            let href = absolute.to_string();
            if !seen.insert(href.clone()) {
                continue;
            }

            let index = items.len();
            let style_no = non_blank(link.style_no.as_deref())
                .or_else(|| {
                    href.rsplit_once("id=")
                        .map(|(_, tail)| tail.to_string())
                        .filter(|s| !s.is_empty())
                })
                .unwrap_or_else(|| (index + 1).to_string());

            items.push(CatalogItem {
                index,
                style_no,
                style_name: non_blank(link.style_name.as_deref()).unwrap_or_default(),
                href,
                reference_id: String::new(),
                brand: non_blank(link.brand.as_deref()).unwrap_or_default(),
                season: non_blank(link.season.as_deref()).unwrap_or_default(),
                supplier: non_blank(link.supplier.as_deref()).unwrap_or_default(),
                image_url: None,
                links: crate::model::AuxLinks::default(),
            });
        }
        items
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}
