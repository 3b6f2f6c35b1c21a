//! Cart lines and tier pricing.
//!
//! A line whose quantity meets its item's promotional threshold is priced at
//! the discounted unit price for the *whole* quantity (tier pricing, not
//! marginal). Everything here is pure arithmetic over [`Decimal`], so totals
//! are exact: `savings == original_total - total` always holds.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use basket_core::{CatalogItem, ItemId};

/// Largest quantity a line can hold. Persisted quantities are `INT4`.
pub const MAX_QUANTITY: u32 = i32::MAX.unsigned_abs();

/// One `(item, quantity)` pairing inside a cart.
///
/// The quantity is always at least 1; the store removes a line rather than
/// holding it at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub item: Arc<CatalogItem>,
    pub quantity: u32,
}

impl CartLine {
    /// Create a line. Callers guarantee `quantity >= 1`.
    #[must_use]
    pub const fn new(item: Arc<CatalogItem>, quantity: u32) -> Self {
        Self { item, quantity }
    }

    /// The catalog id this line refers to.
    #[must_use]
    pub fn item_id(&self) -> ItemId {
        self.item.id
    }

    /// Whether the item's promotional tier is in effect for this quantity.
    #[must_use]
    pub fn promo_applied(&self) -> bool {
        self.item
            .promo
            .is_some_and(|tier| tier.applies_to(self.quantity))
    }

    /// How many more units unlock the promotional tier.
    ///
    /// `None` when the item has no tier or the tier already applies.
    #[must_use]
    pub fn units_until_promo(&self) -> Option<u32> {
        let tier = self.item.promo?;
        tier.min_quantity
            .checked_sub(self.quantity)
            .filter(|&missing| missing > 0)
    }

    /// Unit price after any promotional discount.
    #[must_use]
    pub fn effective_unit_price(&self) -> Decimal {
        match self.item.promo {
            Some(tier) if tier.applies_to(self.quantity) => tier.discount.apply(self.item.price),
            _ => self.item.price,
        }
    }

    /// Line total after any promotional discount.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        let undiscounted = self.original_line_total();
        match self.item.promo {
            Some(tier) if tier.applies_to(self.quantity) => tier.discount.apply(undiscounted),
            _ => undiscounted,
        }
    }

    /// Line total at full price.
    #[must_use]
    pub fn original_line_total(&self) -> Decimal {
        self.item.price * Decimal::from(self.quantity)
    }
}

/// Sum of discounted line totals.
#[must_use]
pub fn total(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::line_total).sum()
}

/// Sum of undiscounted line totals.
#[must_use]
pub fn original_total(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::original_line_total).sum()
}

/// Amount saved through promotional tiers. Never negative.
#[must_use]
pub fn savings(lines: &[CartLine]) -> Decimal {
    original_total(lines) - total(lines)
}

/// Sum of raw quantities across lines.
#[must_use]
pub fn item_count(lines: &[CartLine]) -> u64 {
    lines.iter().map(|line| u64::from(line.quantity)).sum()
}

/// Priced summary of a cart, as shown in the cart footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub total: Decimal,
    pub original_total: Decimal,
    pub savings: Decimal,
    pub item_count: u64,
    pub line_count: usize,
}

impl CartTotals {
    /// Price a set of lines.
    #[must_use]
    pub fn of(lines: &[CartLine]) -> Self {
        let total = total(lines);
        let original_total = original_total(lines);
        Self {
            total,
            original_total,
            savings: original_total - total,
            item_count: item_count(lines),
            line_count: lines.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use basket_core::Percent;

    use super::*;

    fn yogurt() -> Arc<CatalogItem> {
        Arc::new(
            CatalogItem::new(ItemId::new(1), "Greek Yogurt", "Dairy", Decimal::from(89))
                .with_promo(3, Percent::new(Decimal::from(20)).unwrap()),
        )
    }

    fn bread() -> Arc<CatalogItem> {
        Arc::new(CatalogItem::new(
            ItemId::new(3),
            "Borodinsky Bread",
            "Bakery",
            Decimal::from(65),
        ))
    }

    #[test]
    fn test_below_threshold_is_full_price() {
        let line = CartLine::new(yogurt(), 2);
        assert!(!line.promo_applied());
        assert_eq!(line.line_total(), Decimal::from(178));
        assert_eq!(line.effective_unit_price(), Decimal::from(89));
    }

    #[test]
    fn test_at_threshold_discounts_whole_quantity() {
        let line = CartLine::new(yogurt(), 3);
        assert!(line.promo_applied());
        assert_eq!(line.line_total(), Decimal::new(2136, 1));
        assert_eq!(line.effective_unit_price(), Decimal::new(712, 1));
        assert_eq!(line.original_line_total(), Decimal::from(267));
    }

    #[test]
    fn test_above_threshold_keeps_discount() {
        let line = CartLine::new(yogurt(), 5);
        // 89 * 5 * 0.8
        assert_eq!(line.line_total(), Decimal::from(356));
    }

    #[test]
    fn test_units_until_promo() {
        assert_eq!(CartLine::new(yogurt(), 1).units_until_promo(), Some(2));
        assert_eq!(CartLine::new(yogurt(), 3).units_until_promo(), None);
        assert_eq!(CartLine::new(yogurt(), 4).units_until_promo(), None);
        assert_eq!(CartLine::new(bread(), 1).units_until_promo(), None);
    }

    #[test]
    fn test_totals_over_mixed_lines() {
        let lines = vec![CartLine::new(yogurt(), 3), CartLine::new(bread(), 2)];
        let totals = CartTotals::of(&lines);

        assert_eq!(totals.total, Decimal::new(3436, 1)); // 213.6 + 130
        assert_eq!(totals.original_total, Decimal::from(397)); // 267 + 130
        assert_eq!(totals.savings, Decimal::new(534, 1));
        assert_eq!(totals.savings, totals.original_total - totals.total);
        assert_eq!(totals.item_count, 5);
        assert_eq!(totals.line_count, 2);
    }

    #[test]
    fn test_empty_cart_totals_are_zero() {
        let totals = CartTotals::of(&[]);
        assert_eq!(totals.total, Decimal::ZERO);
        assert_eq!(totals.savings, Decimal::ZERO);
        assert_eq!(totals.item_count, 0);
    }

    #[test]
    fn test_savings_never_negative() {
        for quantity in 1..=10 {
            let lines = vec![CartLine::new(yogurt(), quantity), CartLine::new(bread(), quantity)];
            assert!(savings(&lines) >= Decimal::ZERO);
        }
    }
}
