//! Shapes preferences, browsing history and candidate products into the
//! bounded payload sent to the text generation service.

use serde::Serialize;
use std::fmt::{self, Display};

use crate::{
    models::{BrowsingHistory, HistorySummary, Preferences, Product},
    services::{catalog::ProductStore, filter::filter_products},
};

/// Number of recommendations requested from the generator
pub const RECOMMENDATION_COUNT: usize = 5;

const DESCRIPTION_LIMIT: usize = 100;
const FEATURE_LIMIT: usize = 3;

/// Upper bounds on how much of the catalog and history go into one payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimits {
    pub max_candidates: usize,
    pub max_history: usize,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            max_candidates: 10,
            max_history: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreferenceSummary {
    pub price_range: String,
    pub categories: Vec<String>,
    pub brands: Vec<String>,
}

impl From<&Preferences> for PreferenceSummary {
    fn from(preferences: &Preferences) -> Self {
        Self {
            price_range: preferences.price_range.to_string(),
            categories: preferences.categories.iter().cloned().collect(),
            brands: preferences.brands.iter().cloned().collect(),
        }
    }
}

/// Compact product view offered to the generator as a recommendation option
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CandidateProduct {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub subcategory: String,
    pub price: f64,
    pub rating: f64,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl From<&Product> for CandidateProduct {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            brand: product.brand.clone(),
            category: product.category.clone(),
            subcategory: product.subcategory.clone(),
            price: product.price,
            rating: product.rating,
            tags: product.tags.iter().cloned().collect(),
            description: product.description.as_deref().map(truncate_description),
            features: product.features.iter().take(FEATURE_LIMIT).cloned().collect(),
        }
    }
}

fn truncate_description(description: &str) -> String {
    if description.chars().count() <= DESCRIPTION_LIMIT {
        return description.to_string();
    }
    let head: String = description.chars().take(DESCRIPTION_LIMIT - 3).collect();
    format!("{}...", head)
}

/// Structured request for one round of recommendation generation
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendationPayload {
    pub preferences: PreferenceSummary,
    /// Recently viewed products, oldest first
    pub recently_viewed: Vec<Product>,
    pub behavioral_insight: String,
    pub candidates: Vec<CandidateProduct>,
}

impl RecommendationPayload {
    pub fn candidate_ids(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|c| c.id.as_str())
    }

    /// Renders the payload as the user prompt for a chat completion
    pub fn to_prompt(&self) -> String {
        self.to_string()
    }
}

impl Display for RecommendationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "You are an expert e-commerce product recommendation specialist. \
             Recommend the most relevant products for a user based on their browsing history and preferences."
        )?;

        writeln!(f, "\n# USER BROWSING HISTORY")?;
        if self.recently_viewed.is_empty() {
            writeln!(f, "- No browsing history available")?;
        }
        for product in &self.recently_viewed {
            writeln!(f, "- {} (ID: {})", product.name, product.id)?;
            writeln!(
                f,
                "  Category: {}, Subcategory: {}",
                product.category, product.subcategory
            )?;
            writeln!(f, "  Brand: {}, Price: ${:.2}", product.brand, product.price)?;
            if !product.tags.is_empty() {
                writeln!(f, "  Tags: {}", join(product.tags.iter()))?;
            }
        }

        writeln!(f, "\n# BEHAVIORAL INSIGHT\n- {}", self.behavioral_insight)?;

        writeln!(f, "\n# USER PREFERENCES")?;
        writeln!(f, "- Price Range: {}", self.preferences.price_range)?;
        if !self.preferences.categories.is_empty() {
            writeln!(f, "- Categories: {}", self.preferences.categories.join(", "))?;
        }
        if !self.preferences.brands.is_empty() {
            writeln!(f, "- Brands: {}", self.preferences.brands.join(", "))?;
        }

        writeln!(f, "\n# AVAILABLE PRODUCTS FOR RECOMMENDATION")?;
        for (i, product) in self.candidates.iter().enumerate() {
            writeln!(f, "Product {}: {} (ID: {})", i + 1, product.name, product.id)?;
            writeln!(
                f,
                "- Category: {}, Subcategory: {}",
                product.category, product.subcategory
            )?;
            writeln!(f, "- Brand: {}, Price: ${:.2}", product.brand, product.price)?;
            writeln!(f, "- Rating: {}", product.rating)?;
            if let Some(description) = &product.description {
                writeln!(f, "- Description: {}", description)?;
            }
            if !product.features.is_empty() {
                writeln!(f, "- Features: {}", product.features.join(", "))?;
            }
            if !product.tags.is_empty() {
                writeln!(f, "- Tags: {}", product.tags.join(", "))?;
            }
        }

        let count = RECOMMENDATION_COUNT.min(self.candidates.len());
        writeln!(f, "\n# TASK")?;
        writeln!(
            f,
            "Recommend {} products from the available products list. Only use IDs listed above, \
             never recommend the same product twice, and give each product a specific explanation \
             of why it matches this user. Assign each a relevance score between 0.0 and 1.0.",
            count
        )?;

        writeln!(f, "\n# OUTPUT FORMAT")?;
        write!(
            f,
            "Return only a valid JSON array of objects with exactly these fields:\n\
             [{{\"product_id\": \"<id>\", \"relevance_score\": 0.95, \"explanation\": \"<why>\"}}]"
        )
    }
}

fn join<'a>(values: impl Iterator<Item = &'a String>) -> String {
    values.map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Builds recommendation payloads against a catalog
pub struct RequestBuilder<'a> {
    store: &'a ProductStore,
    limits: PayloadLimits,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(store: &'a ProductStore, limits: PayloadLimits) -> Self {
        Self { store, limits }
    }

    /// Picks the candidate products for a payload.
    ///
    /// Starts from the preference-filtered catalog, or the whole catalog when
    /// nothing matches. Already viewed products are dropped unless that would
    /// leave nothing. With a history, candidates are ordered by affinity to
    /// the viewed products before the cap is applied.
    pub fn select_candidates(
        &self,
        preferences: &Preferences,
        viewed: &[&Product],
    ) -> Vec<&'a Product> {
        let mut candidates = filter_products(self.store.all(), preferences);

        if candidates.is_empty() {
            tracing::debug!("No products match preferences, falling back to full catalog");
            candidates = self.store.all().iter().collect();
        }

        let unseen: Vec<&Product> = candidates
            .iter()
            .copied()
            .filter(|p| !viewed.iter().any(|v| v.id == p.id))
            .collect();
        if !unseen.is_empty() {
            candidates = unseen;
        }

        if !viewed.is_empty() {
            let mut scored: Vec<(&Product, u32)> = candidates
                .into_iter()
                .map(|p| (p, viewed.iter().map(|v| v.affinity(p)).sum()))
                .collect();
            scored.sort_by(|a, b| b.1.cmp(&a.1));
            candidates = scored.into_iter().map(|(p, _)| p).collect();
        }

        candidates.truncate(self.limits.max_candidates);
        candidates
    }

    pub fn build(&self, preferences: &Preferences, history: &BrowsingHistory) -> RecommendationPayload {
        let resolved = history.resolve(self.store);
        let summary = HistorySummary::from_products(history.len(), &resolved);
        let viewed = &resolved[resolved.len().saturating_sub(self.limits.max_history)..];
        let candidates = self.select_candidates(preferences, &resolved);

        tracing::debug!(
            viewed = viewed.len(),
            candidates = candidates.len(),
            "Recommendation payload built"
        );

        RecommendationPayload {
            preferences: PreferenceSummary::from(preferences),
            recently_viewed: viewed.iter().map(|p| (*p).clone()).collect(),
            behavioral_insight: summary.insight(),
            candidates: candidates.into_iter().map(CandidateProduct::from).collect(),
        }
    }
}
