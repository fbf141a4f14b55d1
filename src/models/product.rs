use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};

/// Highest rating a product can carry
pub const MAX_RATING: f64 = 5.0;

/// A catalog product. Immutable once the catalog is loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    pub price: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Product {
    /// Checks the invariants a catalog entry must satisfy
    pub fn validate(&self) -> AppResult<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "Product '{}' has an empty id",
                self.name
            )));
        }

        if !self.price.is_finite() || self.price < 0.0 {
            return Err(AppError::Validation(format!(
                "Product {} has invalid price {}",
                self.id, self.price
            )));
        }

        if !self.rating.is_finite() || !(0.0..=MAX_RATING).contains(&self.rating) {
            return Err(AppError::Validation(format!(
                "Product {} has rating {} outside 0-{}",
                self.id, self.rating, MAX_RATING
            )));
        }

        Ok(())
    }

    /// Number of tags shared with another product
    pub fn shared_tags(&self, other: &Product) -> usize {
        self.tags.intersection(&other.tags).count()
    }

    /// Attribute affinity between two products.
    ///
    /// Same category scores 3, same subcategory 2, same brand 1, plus one per
    /// shared tag and one when prices are within 20% of each other.
    pub fn affinity(&self, other: &Product) -> u32 {
        let mut score = 0;

        if self.category == other.category {
            score += 3;
        }
        if !self.subcategory.is_empty() && self.subcategory == other.subcategory {
            score += 2;
        }
        if self.brand == other.brand {
            score += 1;
        }

        score += self.shared_tags(other) as u32;

        if self.price > 0.0 {
            let ratio = other.price / self.price;
            if (0.8..=1.2).contains(&ratio) {
                score += 1;
            }
        }

        score
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_validate_accepts_well_formed_product() {
        assert!(product("p1", "Electronics", "Apple", 30.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let p = product("p1", "Electronics", "Apple", -1.0);
        assert!(matches!(p.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_rating_out_of_range() {
        let mut p = product("p1", "Electronics", "Apple", 10.0);
        p.rating = 5.5;
        assert!(matches!(p.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_blank_id() {
        let p = product("  ", "Electronics", "Apple", 10.0);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_affinity_scores_shared_attributes() {
        let a = with_tags(product("a", "Audio", "Sony", 100.0), &["wireless", "noise-cancelling"]);
        let b = with_tags(product("b", "Audio", "Sony", 110.0), &["wireless"]);
        let c = product("c", "Kitchen", "Oxo", 15.0);

        // category 3 + brand 1 + one tag + price within 20%
        assert_eq!(a.affinity(&b), 6);
        assert_eq!(a.affinity(&c), 0);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "id": "p1",
            "name": "Trail Shoe",
            "brand": "Salomon",
            "category": "Footwear",
            "price": 129.99
        }"#;

        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.subcategory, "");
        assert_eq!(product.rating, 0.0);
        assert!(product.tags.is_empty());
        assert!(product.description.is_none());
    }
}
