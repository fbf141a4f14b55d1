use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
    path::Path,
};

use crate::{
    error::{AppError, AppResult},
    models::{split_list, PriceBounds, Product, ProductQuery, SortField, SortOrder},
};

/// Immutable product catalog loaded once at startup
#[derive(Debug, Default)]
pub struct ProductStore {
    products: Vec<Product>,
    /// Product id → position in `products`
    index: HashMap<String, usize>,
}

impl ProductStore {
    /// Builds a store, validating every product and rejecting duplicate ids
    pub fn from_products(products: Vec<Product>) -> AppResult<Self> {
        let mut index = HashMap::with_capacity(products.len());

        for (position, product) in products.iter().enumerate() {
            product.validate()?;
            if index.insert(product.id.clone(), position).is_some() {
                return Err(AppError::Validation(format!(
                    "Duplicate product id {}",
                    product.id
                )));
            }
        }

        Ok(Self { products, index })
    }

    /// Loads the catalog from a JSON file containing an array of products
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Catalog(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let products: Vec<Product> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Catalog(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let store = Self::from_products(products)?;

        tracing::info!(
            path = %path.display(),
            products = store.len(),
            "Product catalog loaded"
        );

        Ok(store)
    }

    pub fn all(&self) -> &[Product] {
        &self.products
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.index.get(id).map(|&position| &self.products[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Sorted unique categories
    pub fn categories(&self) -> Vec<String> {
        self.unique(|p| Some(p.category.as_str()))
    }

    /// Sorted unique subcategories, optionally restricted to one category
    pub fn subcategories(&self, category: Option<&str>) -> Vec<String> {
        self.unique(|p| match category {
            Some(c) if p.category != c => None,
            _ => Some(p.subcategory.as_str()),
        })
    }

    /// Sorted unique brands
    pub fn brands(&self) -> Vec<String> {
        self.unique(|p| Some(p.brand.as_str()))
    }

    /// Sorted unique tags
    pub fn tags(&self) -> Vec<String> {
        self.products
            .iter()
            .flat_map(|p| p.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn unique<'a, F>(&'a self, field: F) -> Vec<String>
    where
        F: Fn(&'a Product) -> Option<&'a str>,
    {
        self.products
            .iter()
            .filter_map(field)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Lowest and highest price; zeroes for an empty catalog
    pub fn price_bounds(&self) -> PriceBounds {
        let mut prices = self.products.iter().map(|p| p.price);
        match prices.next() {
            Some(first) => {
                let (min, max) = prices.fold((first, first), |(min, max), price| {
                    (min.min(price), max.max(price))
                });
                PriceBounds { min, max }
            }
            None => PriceBounds { min: 0.0, max: 0.0 },
        }
    }

    /// Filters, sorts and limits the catalog
    pub fn query(&self, query: &ProductQuery) -> Vec<&Product> {
        let categories = split_list(query.category.as_deref());
        let subcategories = split_list(query.subcategory.as_deref());
        let brands = split_list(query.brand.as_deref());
        let tags = split_list(query.tags.as_deref());
        let search = query
            .q
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        let mut results: Vec<&Product> = self
            .products
            .iter()
            .filter(|p| categories.is_empty() || categories.contains(&p.category))
            .filter(|p| subcategories.is_empty() || subcategories.contains(&p.subcategory))
            .filter(|p| brands.is_empty() || brands.contains(&p.brand))
            .filter(|p| query.min_price.map_or(true, |min| p.price >= min))
            .filter(|p| query.max_price.map_or(true, |max| p.price <= max))
            .filter(|p| tags.is_empty() || tags.iter().any(|t| p.tags.contains(t)))
            .filter(|p| query.min_rating.map_or(true, |min| p.rating >= min))
            .filter(|p| search.as_deref().map_or(true, |q| matches_search(p, q)))
            .collect();

        results.sort_by(|a, b| {
            let ordering = compare_by(a, b, query.sort_by);
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        if let Some(limit) = query.limit.filter(|&l| l > 0) {
            results.truncate(limit);
        }

        results
    }

    /// Products most related to the given one by attribute affinity
    pub fn related(&self, product_id: &str, limit: usize) -> AppResult<Vec<&Product>> {
        let source = self
            .get(product_id)
            .ok_or_else(|| AppError::NotFound(format!("Product with ID {} not found", product_id)))?;

        let mut scored: Vec<(&Product, u32)> = self
            .products
            .iter()
            .filter(|p| p.id != source.id)
            .map(|p| (p, source.affinity(p)))
            .filter(|(_, score)| *score > 0)
            .collect();

        // Stable sort keeps catalog order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(scored.into_iter().take(limit).map(|(p, _)| p).collect())
    }
}

fn matches_search(product: &Product, needle: &str) -> bool {
    product.name.to_lowercase().contains(needle)
        || product
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
        || product.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

fn compare_by(a: &Product, b: &Product, field: SortField) -> Ordering {
    match field {
        SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortField::Price => a.price.total_cmp(&b.price),
        SortField::Rating => a.rating.total_cmp(&b.rating),
    }
}
