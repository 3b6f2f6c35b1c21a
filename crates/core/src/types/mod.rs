//! Core types for Basket.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod item;
pub mod price;

pub use id::*;
pub use item::{CatalogItem, PromoTier};
pub use price::{Percent, PercentError};
