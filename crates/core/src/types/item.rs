//! Catalog item records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ItemId, Percent};

/// A quantity-tiered promotion: buying at least `min_quantity` units prices
/// the whole line at `discount` off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromoTier {
    /// Minimum quantity at which the discount applies.
    pub min_quantity: u32,
    /// Discount applied to every unit once the threshold is met.
    pub discount: Percent,
}

impl PromoTier {
    /// Whether a line of `quantity` units qualifies for this tier.
    #[must_use]
    pub const fn applies_to(&self, quantity: u32) -> bool {
        quantity >= self.min_quantity
    }
}

/// A purchasable catalog entry.
///
/// Loaded once from configuration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    /// Unit price.
    pub price: Decimal,
    /// Struck-through "was" price shown next to the current price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_price: Option<Decimal>,
    /// Promotional badge text (e.g. "-25%").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo: Option<PromoTier>,
    /// Display glyph or image URL.
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Pack size as printed on the label ("500 g", "1 l").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Decimal>,
}

impl CatalogItem {
    /// Create an item with only the fields pricing depends on.
    #[must_use]
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        category: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category: category.into(),
            price,
            old_price: None,
            badge: None,
            description: String::new(),
            promo: None,
            image: String::new(),
            origin: None,
            weight: None,
            rating: None,
        }
    }

    /// Attach a promotional tier.
    #[must_use]
    pub fn with_promo(mut self, min_quantity: u32, discount: Percent) -> Self {
        self.promo = Some(PromoTier {
            min_quantity,
            discount,
        });
        self
    }

    /// Whether the item is shown as "on sale" (has a badge).
    #[must_use]
    pub const fn is_promoted(&self) -> bool {
        self.badge.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_promo_tier_threshold_is_inclusive() {
        let tier = PromoTier {
            min_quantity: 3,
            discount: Percent::new(Decimal::from(20)).unwrap(),
        };
        assert!(!tier.applies_to(2));
        assert!(tier.applies_to(3));
        assert!(tier.applies_to(10));
    }

    #[test]
    fn test_deserialize_minimal_item() {
        let item: CatalogItem = serde_json::from_str(
            r#"{"id": 2, "name": "Hass Avocado", "category": "Produce", "price": 149}"#,
        )
        .unwrap();
        assert_eq!(item.id, ItemId::new(2));
        assert_eq!(item.price, Decimal::from(149));
        assert!(item.promo.is_none());
        assert!(!item.is_promoted());
    }

    #[test]
    fn test_deserialize_item_with_promo() {
        let item: CatalogItem = serde_json::from_str(
            r#"{
                "id": 1, "name": "Greek Yogurt", "category": "Dairy", "price": 89,
                "old_price": 119, "badge": "-25%",
                "promo": {"min_quantity": 3, "discount": 20}
            }"#,
        )
        .unwrap();
        let promo = item.promo.unwrap();
        assert_eq!(promo.min_quantity, 3);
        assert_eq!(promo.discount.value(), Decimal::from(20));
        assert!(item.is_promoted());
    }
}
