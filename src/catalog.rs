//! # Catalog Snapshot
//!
//! The product and category lists as they were when the current poll cycle
//! started. Every classification and rendering decision in a cycle reads from
//! the same snapshot; edits made by staff show up on the next cycle.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::command::is_valid_id;
use crate::model::{Category, Product};
use crate::store::CatalogStore;

/// Immutable view of the catalog for one poll cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
}

impl CatalogSnapshot {
    pub fn new(products: Vec<Product>, categories: Vec<Category>) -> Self {
        Self {
            products,
            categories,
        }
    }

    /// Fetch both lists from the store; any failure aborts the cycle.
    /// Records whose ids cannot be put on a button are left out.
    pub async fn load(store: &dyn CatalogStore) -> Result<Self> {
        let mut products = store
            .list_products()
            .await
            .context("Failed to load products")?;
        let mut categories = store
            .list_categories()
            .await
            .context("Failed to load categories")?;

        products.retain(|p| {
            let valid = is_valid_id(&p.id);
            if !valid {
                warn!(product_id = %p.id, "Skipping product with an unusable id");
            }
            valid
        });
        categories.retain(|c| {
            let valid = is_valid_id(&c.id);
            if !valid {
                warn!(category_id = %c.id, "Skipping category with an unusable id");
            }
            valid
        });

        debug!(
            products = products.len(),
            categories = categories.len(),
            "Catalog snapshot loaded"
        );

        Ok(Self::new(products, categories))
    }

    pub fn product(&self, product_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }

    pub fn category(&self, category_id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == category_id)
    }

    /// Category name for display, `None` when the product is uncategorized
    /// or points at a deleted category
    pub fn category_name(&self, category_id: &str) -> Option<&str> {
        self.category(category_id).map(|c| c.name.as_str())
    }

    pub fn products_in_category<'a>(
        &'a self,
        category_id: &'a str,
    ) -> impl Iterator<Item = &'a Product> + 'a {
        self.products
            .iter()
            .filter(move |p| p.category_id == category_id)
    }

    /// Case-insensitive substring search over product name and code
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Product> {
        let needle = query.trim().to_lowercase();
        self.products
            .iter()
            .filter(|p| p.matches(&needle))
            .take(limit)
            .collect()
    }

    /// Newest products first, for the flat listing used when no categories exist
    pub fn newest_products(&self, limit: usize) -> Vec<&Product> {
        let mut products: Vec<&Product> = self.products.iter().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products.truncate(limit);
        products
    }
}
