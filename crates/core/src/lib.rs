//! Basket Core - Shared types library.
//!
//! This crate provides the domain types shared by all Basket components:
//! - `cart` - The cart store, catalog provider, and remote persistence backends
//! - `cli` - Command-line tools for migrations and cart inspection
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, validated percentages, and catalog item records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
