use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{models::Product, services::catalog::ProductStore};

/// Ordered record of viewed product ids.
///
/// Insertion order is view order. A repeat view keeps the product at the
/// position of its first view.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct BrowsingHistory {
    ids: Vec<String>,
    /// Membership index over `ids`
    seen: HashSet<String>,
}

impl From<Vec<String>> for BrowsingHistory {
    fn from(ids: Vec<String>) -> Self {
        Self::from_views(ids)
    }
}

impl From<BrowsingHistory> for Vec<String> {
    fn from(history: BrowsingHistory) -> Self {
        history.ids
    }
}

/// Behavioral summary derived from the products in a history
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistorySummary {
    /// Number of ids in the history
    pub viewed_count: usize,
    /// Number of ids that resolved to a catalog product
    pub resolved_count: usize,
    /// Category seen most often; ties go to the first one viewed
    pub top_category: Option<String>,
    pub average_price: Option<f64>,
}

impl BrowsingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a history from a sequence of views, suppressing duplicates
    pub fn from_views<I, S>(views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut history = Self::new();
        for id in views {
            history.record(id);
        }
        history
    }

    /// Records a view. Returns false if the id was already present.
    pub fn record(&mut self, product_id: impl Into<String>) -> bool {
        let product_id = product_id.into();
        if !self.seen.insert(product_id.clone()) {
            return false;
        }
        self.ids.push(product_id);
        true
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.seen.clear();
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Resolves ids against the catalog, skipping any that no longer exist
    pub fn resolve<'a>(&self, store: &'a ProductStore) -> Vec<&'a Product> {
        self.ids
            .iter()
            .filter_map(|id| {
                let product = store.get(id);
                if product.is_none() {
                    tracing::warn!(product_id = %id, "Skipping unknown product in browsing history");
                }
                product
            })
            .collect()
    }

    pub fn summarize(&self, store: &ProductStore) -> HistorySummary {
        let products = self.resolve(store);
        HistorySummary::from_products(self.ids.len(), &products)
    }
}

impl HistorySummary {
    /// Summarizes already resolved history products
    pub fn from_products(viewed_count: usize, products: &[&Product]) -> Self {
        // (category, count) in first-seen order
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for product in products {
            match counts.iter_mut().find(|(c, _)| *c == product.category) {
                Some((_, count)) => *count += 1,
                None => counts.push((product.category.as_str(), 1)),
            }
        }

        let mut top: Option<(&str, usize)> = None;
        for (category, count) in counts {
            if top.map_or(true, |(_, best)| count > best) {
                top = Some((category, count));
            }
        }

        let average_price = if products.is_empty() {
            None
        } else {
            Some(products.iter().map(|p| p.price).sum::<f64>() / products.len() as f64)
        };

        Self {
            viewed_count,
            resolved_count: products.len(),
            top_category: top.map(|(category, _)| category.to_string()),
            average_price,
        }
    }

    /// One-line description of browsing behavior for prompt context
    pub fn insight(&self) -> String {
        match (&self.top_category, self.average_price) {
            (Some(category), Some(price)) => format!(
                "User has viewed {} product(s), mostly in {}, with an average viewed price of ${:.2}",
                self.resolved_count, category, price
            ),
            _ => "No browsing history available".to_string(),
        }
    }
}
