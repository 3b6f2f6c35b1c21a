//! Cart commands.
//!
//! Each command opens a cart store against the configured remote, binds the
//! user (which loads their persisted cart), applies the change, and waits for
//! the sync worker to write it back before exiting.
//!
//! # Usage
//!
//! ```bash
//! basket-cli cart show --user <uuid> [--json]
//! basket-cli cart add --user <uuid> --item 1 --qty 3
//! basket-cli cart set --user <uuid> --item 1 --qty 2
//! basket-cli cart remove --user <uuid> --item 1
//! basket-cli cart clear --user <uuid>
//! ```

use std::sync::Arc;

use basket_cart::{CartConfig, CartSnapshot, CartStore, SyncStatus};
use basket_core::{ItemId, UserId};
use serde_json::json;

use super::{CliError, connect_remote, load_catalog};

/// Print a user's persisted cart.
pub async fn show(config: &CartConfig, user_id: UserId, as_json: bool) -> Result<(), CliError> {
    let store = open(config, user_id).await?;
    let snapshot = store.snapshot();
    let status = store.sync_status();
    store.shutdown().await?;

    if as_json {
        print_json(&snapshot, &status)?;
    } else {
        print_cart(&snapshot);
    }
    Ok(())
}

/// Add `quantity` units of an item.
pub async fn add(
    config: &CartConfig,
    user_id: UserId,
    item_id: ItemId,
    quantity: u32,
) -> Result<(), CliError> {
    let store = open(config, user_id).await?;
    if store.catalog().get(item_id).is_none() {
        return Err(CliError::UnknownItem(item_id));
    }

    if quantity == 1 {
        store.add_item_by_id(item_id);
    } else {
        let current = store.snapshot().quantity_of(item_id);
        store.set_quantity(item_id, i64::from(current) + i64::from(quantity));
    }
    finish(&store).await
}

/// Set an item's quantity.
pub async fn set(
    config: &CartConfig,
    user_id: UserId,
    item_id: ItemId,
    quantity: i64,
) -> Result<(), CliError> {
    let store = open(config, user_id).await?;
    if quantity > 0 && store.catalog().get(item_id).is_none() {
        return Err(CliError::UnknownItem(item_id));
    }
    store.set_quantity(item_id, quantity);
    finish(&store).await
}

/// Remove an item.
pub async fn remove(config: &CartConfig, user_id: UserId, item_id: ItemId) -> Result<(), CliError> {
    let store = open(config, user_id).await?;
    store.remove_item(item_id);
    finish(&store).await
}

/// Empty the cart.
pub async fn clear(config: &CartConfig, user_id: UserId) -> Result<(), CliError> {
    let store = open(config, user_id).await?;
    store.clear();
    finish(&store).await
}

/// Build a store, bind `user_id`, and wait for their cart to load.
async fn open(config: &CartConfig, user_id: UserId) -> Result<CartStore, CliError> {
    let catalog = Arc::new(load_catalog(config)?);
    let remote = connect_remote(config).await?;

    let store = CartStore::builder(catalog, remote)
        .sync_debounce(config.sync_debounce)
        .spawn();

    store.bind_user(Some(user_id));
    store.wait_idle().await?;

    if let Some(error) = store.sync_status().last_error {
        return Err(CliError::LoadFailed(error));
    }
    Ok(store)
}

/// Wait for the change to be written, report it, and stop the worker.
async fn finish(store: &CartStore) -> Result<(), CliError> {
    store.shutdown().await?;

    let status = store.sync_status();
    if let Some(error) = status.last_error {
        tracing::error!(error = %error, "Cart change was not persisted");
    } else {
        tracing::info!(syncs = status.successful_syncs, "Cart persisted");
    }

    print_cart(&store.snapshot());
    Ok(())
}

fn print_cart(snapshot: &CartSnapshot) {
    #[allow(clippy::print_stdout)]
    {
        if snapshot.is_empty() {
            println!("Cart is empty");
            return;
        }

        for line in &snapshot.lines {
            let mut row = format!(
                "{:>4}  {:<24} x{:<4} {:>10}",
                line.item_id().as_i32(),
                line.item.name,
                line.quantity,
                line.line_total()
            );
            if line.promo_applied() {
                row.push_str(&format!("  (was {})", line.original_line_total()));
            } else if let Some(missing) = line.units_until_promo() {
                row.push_str(&format!("  add {missing} more for the promo price"));
            }
            println!("{row}");
        }

        let totals = snapshot.totals();
        println!("Items: {}", totals.item_count);
        println!("Total: {}", totals.total);
        if totals.savings > rust_decimal::Decimal::ZERO {
            println!("Saved: {} (from {})", totals.savings, totals.original_total);
        }
    }
}

fn print_json(snapshot: &CartSnapshot, status: &SyncStatus) -> Result<(), CliError> {
    let lines: Vec<_> = snapshot
        .lines
        .iter()
        .map(|line| {
            json!({
                "item_id": line.item_id(),
                "name": line.item.name,
                "quantity": line.quantity,
                "line_total": line.line_total(),
                "promo_applied": line.promo_applied(),
            })
        })
        .collect();

    let output = json!({
        "lines": lines,
        "totals": snapshot.totals(),
        "sync": status,
    });

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}
