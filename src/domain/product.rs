use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Store-side identifier of a purchasable product (the provider's SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A product as described by the store. Only produced by catalog queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDescription {
    pub id: ProductId,
    pub display_name: String,
    pub description: String,
    /// Price already localised by the provider; never parsed here.
    pub formatted_price: String,
}

/// The result of one successful inventory query.
///
/// Snapshots are replaced wholesale by the catalog cache, never merged.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    products: HashMap<ProductId, ProductDescription>,
    fresh: bool,
    fetched_at: Instant,
}

impl CatalogSnapshot {
    pub fn new(products: impl IntoIterator<Item = ProductDescription>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            fresh: true,
            fetched_at: Instant::now(),
        }
    }

    pub fn get(&self, id: &ProductId) -> Option<&ProductDescription> {
        self.products.get(id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Whether the snapshot may still be served without a provider round-trip.
    pub fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        self.fresh && ttl.is_none_or(|ttl| self.fetched_at.elapsed() < ttl)
    }

    pub fn mark_stale(&mut self) {
        self.fresh = false;
    }

    /// Descriptions for `ids`, in request order. Unknown ids are skipped.
    pub fn describe(&self, ids: &[ProductId]) -> Vec<ProductDescription> {
        ids.iter().filter_map(|id| self.get(id).cloned()).collect()
    }
}
