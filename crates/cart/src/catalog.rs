//! Static catalog provider.
//!
//! The catalog is configuration, not state: it is loaded once (from the
//! bundled assortment or a JSON file), validated, and shared read-only
//! behind an `Arc`. The cart store uses it to resolve item ids, most notably
//! when rebuilding a cart from persisted `(id, quantity)` rows.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rust_decimal::Decimal;

use basket_core::{CatalogItem, ItemId};

use crate::error::CatalogError;

/// The grocery assortment shipped with the crate.
const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Immutable, validated list of purchasable items.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<Arc<CatalogItem>>,
    index: HashMap<ItemId, usize>,
}

impl Catalog {
    /// Build a catalog, validating every entry.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateId` if two items share an id, or
    /// `CatalogError::InvalidItem` for a negative price or a promotional
    /// tier with a zero threshold.
    pub fn new(items: Vec<CatalogItem>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(items.len());
        let mut stored = Vec::with_capacity(items.len());

        for item in items {
            validate_item(&item)?;
            if index.insert(item.id, stored.len()).is_some() {
                return Err(CatalogError::DuplicateId(item.id));
            }
            stored.push(Arc::new(item));
        }

        Ok(Self {
            items: stored,
            index,
        })
    }

    /// Parse a catalog from a JSON array of items.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed JSON, or any validation
    /// error from [`Catalog::new`].
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let items: Vec<CatalogItem> = serde_json::from_str(json)?;
        Self::new(items)
    }

    /// Load a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Io` if the file cannot be read, or any error
    /// from [`Catalog::from_json`].
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The bundled grocery assortment.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled data is corrupt.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Look up an item by id.
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&Arc<CatalogItem>> {
        self.index.get(&id).and_then(|&pos| self.items.get(pos))
    }

    /// All items in catalog order.
    #[must_use]
    pub fn items(&self) -> &[Arc<CatalogItem>] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct categories in order of first appearance.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for item in &self.items {
            if !seen.contains(&item.category.as_str()) {
                seen.push(&item.category);
            }
        }
        seen
    }

    /// Filter and sort the catalog for a browse page.
    #[must_use]
    pub fn search(&self, query: &CatalogQuery) -> Vec<Arc<CatalogItem>> {
        let needle = query.text.as_deref().map(str::to_lowercase);

        let mut found: Vec<Arc<CatalogItem>> = self
            .items
            .iter()
            .filter(|item| {
                needle
                    .as_deref()
                    .is_none_or(|n| item.name.to_lowercase().contains(n))
            })
            .filter(|item| {
                query
                    .category
                    .as_deref()
                    .is_none_or(|c| item.category == c)
            })
            .filter(|item| query.min_price.is_none_or(|min| item.price >= min))
            .filter(|item| query.max_price.is_none_or(|max| item.price <= max))
            .filter(|item| !query.promo_only || item.is_promoted())
            .cloned()
            .collect();

        // sort_by is stable, so ties keep catalog order
        match query.sort {
            CatalogSort::Default => {}
            CatalogSort::PriceAsc => found.sort_by(|a, b| a.price.cmp(&b.price)),
            CatalogSort::PriceDesc => found.sort_by(|a, b| b.price.cmp(&a.price)),
            CatalogSort::DiscountFirst => {
                found.sort_by_key(|item| !item.is_promoted());
            }
        }

        found
    }
}

/// Sort order for catalog browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogSort {
    /// Catalog order.
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    /// Promoted (badged) items first, otherwise catalog order.
    DiscountFirst,
}

/// Filters for [`Catalog::search`]. Every unset field matches everything.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Case-insensitive substring of the item name.
    pub text: Option<String>,
    /// Exact category name.
    pub category: Option<String>,
    /// Inclusive lower price bound.
    pub min_price: Option<Decimal>,
    /// Inclusive upper price bound.
    pub max_price: Option<Decimal>,
    /// Only items carrying a promotional badge.
    pub promo_only: bool,
    pub sort: CatalogSort,
}

const MAX_RATING: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

fn validate_item(item: &CatalogItem) -> Result<(), CatalogError> {
    let invalid = |reason: &str| CatalogError::InvalidItem {
        id: item.id,
        reason: reason.to_string(),
    };

    if item.price.is_sign_negative() && !item.price.is_zero() {
        return Err(invalid("price cannot be negative"));
    }
    if item
        .old_price
        .is_some_and(|old| old.is_sign_negative() && !old.is_zero())
    {
        return Err(invalid("old price cannot be negative"));
    }
    if item.promo.is_some_and(|tier| tier.min_quantity == 0) {
        return Err(invalid("promotional threshold must be at least 1"));
    }
    if item
        .rating
        .is_some_and(|rating| rating < Decimal::ZERO || rating > MAX_RATING)
    {
        return Err(invalid("rating must be between 0 and 5"));
    }
    Ok(())
}
