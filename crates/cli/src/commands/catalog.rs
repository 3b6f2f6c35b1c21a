//! Catalog browsing commands.
//!
//! # Usage
//!
//! ```bash
//! basket-cli catalog list --search yogurt
//! basket-cli catalog list --category "Fruit & Veg" --max-price 100 --sort price-asc
//! basket-cli catalog categories
//! ```

use basket_cart::{CartConfig, CatalogQuery};
use basket_core::CatalogItem;

use super::{CliError, load_catalog};

/// Print catalog items matching `query`.
pub fn list(config: &CartConfig, query: &CatalogQuery) -> Result<(), CliError> {
    let catalog = load_catalog(config)?;
    let items = catalog.search(query);

    #[allow(clippy::print_stdout)]
    {
        for item in &items {
            println!("{}", describe(item));
        }
        println!("{} of {} items", items.len(), catalog.len());
    }
    Ok(())
}

/// Print the catalog's categories in display order.
pub fn categories(config: &CartConfig) -> Result<(), CliError> {
    let catalog = load_catalog(config)?;

    #[allow(clippy::print_stdout)]
    for category in catalog.categories() {
        println!("{category}");
    }
    Ok(())
}

/// One-line summary of an item.
fn describe(item: &CatalogItem) -> String {
    let mut line = format!(
        "{:>4}  {:<24} {:<12} {:>8}",
        item.id.as_i32(),
        item.name,
        item.category,
        item.price
    );
    if let Some(old_price) = item.old_price {
        line.push_str(&format!("  (was {old_price})"));
    }
    if let Some(badge) = &item.badge {
        line.push_str(&format!("  [{badge}]"));
    }
    if let Some(tier) = item.promo {
        line.push_str(&format!(
            "  {}+ units: {} off",
            tier.min_quantity, tier.discount
        ));
    }
    line
}
