use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use crate::error::AppError;

/// Price bucket a product must fall into.
///
/// Written as `all`, `<min>-<max>` (half-open `[min, max)`) or `<min>+`
/// (`[min, ∞)`), e.g. `0-50`, `50-100`, `100+`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PriceRange {
    #[default]
    All,
    Bounded { min: f64, max: Option<f64> },
}

impl PriceRange {
    /// Returns true if the price falls inside this bucket
    pub fn contains(&self, price: f64) -> bool {
        match self {
            PriceRange::All => true,
            PriceRange::Bounded { min, max } => {
                price >= *min && max.map_or(true, |max| price < max)
            }
        }
    }
}

fn parse_bound(raw: &str, input: &str) -> Result<f64, AppError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid price range '{}'", input)))?;

    if !value.is_finite() || value < 0.0 {
        return Err(AppError::Validation(format!(
            "Price range '{}' has a negative or non-finite bound",
            input
        )));
    }

    Ok(value)
}

impl FromStr for PriceRange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(PriceRange::All);
        }

        if let Some(min) = trimmed.strip_suffix('+') {
            return Ok(PriceRange::Bounded {
                min: parse_bound(min, s)?,
                max: None,
            });
        }

        let (min, max) = trimmed
            .split_once('-')
            .ok_or_else(|| AppError::Validation(format!("Invalid price range '{}'", s)))?;
        let min = parse_bound(min, s)?;
        let max = parse_bound(max, s)?;

        if min >= max {
            return Err(AppError::Validation(format!(
                "Price range '{}' must have min below max",
                s
            )));
        }

        Ok(PriceRange::Bounded {
            min,
            max: Some(max),
        })
    }
}

impl TryFrom<String> for PriceRange {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PriceRange> for String {
    fn from(range: PriceRange) -> Self {
        range.to_string()
    }
}

impl Display for PriceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceRange::All => write!(f, "all"),
            PriceRange::Bounded { min, max: None } => write!(f, "{}+", min),
            PriceRange::Bounded {
                min,
                max: Some(max),
            } => write!(f, "{}-{}", min, max),
        }
    }
}

/// User-selected constraints narrowing the candidate products.
///
/// Empty category or brand sets mean "no constraint".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub price_range: PriceRange,
    #[serde(default, alias = "category")]
    pub categories: BTreeSet<String>,
    #[serde(default, alias = "brand")]
    pub brands: BTreeSet<String>,
}

/// Partial preference update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub price_range: Option<PriceRange>,
    #[serde(alias = "category")]
    pub categories: Option<BTreeSet<String>>,
    #[serde(alias = "brand")]
    pub brands: Option<BTreeSet<String>>,
}

impl Preferences {
    /// Applies a partial update, last write wins per field
    pub fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(price_range) = update.price_range {
            self.price_range = price_range;
        }
        if let Some(categories) = update.categories {
            self.categories = categories;
        }
        if let Some(brands) = update.brands {
            self.brands = brands;
        }
    }

    /// True when no constraint is set at all
    pub fn is_unconstrained(&self) -> bool {
        self.price_range == PriceRange::All && self.categories.is_empty() && self.brands.is_empty()
    }
}
