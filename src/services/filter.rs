use crate::models::{Preferences, Product};

/// Narrows products to those matching the preferences, in catalog order.
///
/// A product passes when its price is inside the price bucket, and its
/// category and brand are in the selected sets. An empty set places no
/// constraint on that field.
pub fn filter_products<'a>(products: &'a [Product], preferences: &Preferences) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| matches_preferences(p, preferences))
        .collect()
}

pub fn matches_preferences(product: &Product, preferences: &Preferences) -> bool {
    preferences.price_range.contains(product.price)
        && (preferences.categories.is_empty() || preferences.categories.contains(&product.category))
        && (preferences.brands.is_empty() || preferences.brands.contains(&product.brand))
}
