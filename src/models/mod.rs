use serde::{Deserialize, Serialize};

pub mod browsing_history;
pub mod preferences;
pub mod product;

pub use browsing_history::{BrowsingHistory, HistorySummary};
pub use preferences::{Preferences, PreferencesUpdate, PriceRange};
pub use product::Product;

/// A product recommended by the generation service, validated against the
/// catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub product: Product,
    pub explanation: String,
    /// Relevance in `[0.0, 1.0]`
    pub relevance_score: f64,
}

/// Field a catalog query is sorted by
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Price,
    Rating,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Catalog query parameters. List-valued fields are comma separated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub tags: Option<String>,
    pub min_rating: Option<f64>,
    pub q: Option<String>,
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub sort_order: SortOrder,
    pub limit: Option<usize>,
}

/// Splits a comma separated query value into trimmed, non-empty items
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Lowest and highest price in the catalog
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}
